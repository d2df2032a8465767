//! LibXML2 FFI Wrapper Module
//!
//! Safe wrappers around the parts of libxml2 the checker depends on: the document
//! reader, the RELAX NG grammar engine and the Schematron rule engine.
//!
//! No mature pure Rust crate provides both RELAX NG and Schematron validation with
//! positioned error reporting, and libxml2 ships both engines next to the parser the
//! XML Schema tooling already links against. Everything here is therefore direct FFI:
//!
//! - **RAII**: documents and compiled schemas free themselves on drop
//! - **Structured errors**: every warning, error and fatal event is captured through a
//!   per-call collector handed to libxml2 as its context pointer, never through shared state
//! - **Per-run isolation**: nothing is cached across runs, each run parses its own grammar
//!
//! Parser errors raised while reading files (documents, grammars, rule-sets) go through
//! libxml2's thread-local structured error handler. The handler is installed only for
//! the duration of a single call and reset afterwards.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Once;

use libc::{c_char, c_int, c_void};

use crate::error::{LibXml2Error, LibXml2Result};

/// Global initialization flag for libxml2
///
/// libxml2's initialization functions are NOT thread-safe, so they run exactly once.
static LIBXML2_INIT: Once = Once::new();

/// Parser option: substitute entities
pub const XML_PARSE_NOENT: c_int = 1 << 1;
/// Parser option: load the external DTD subset
pub const XML_PARSE_DTDLOAD: c_int = 1 << 2;
/// Parser option: default DTD attributes
pub const XML_PARSE_DTDATTR: c_int = 1 << 3;
/// Parser option: validate with the DTD
pub const XML_PARSE_DTDVALID: c_int = 1 << 4;
/// Parser option: forbid network access
pub const XML_PARSE_NONET: c_int = 1 << 11;
/// Parser option: store line numbers above 65535
pub const XML_PARSE_BIG_LINES: c_int = 1 << 22;

/// Schematron output mode: report through the structured error handler
const XML_SCHEMATRON_OUT_ERROR: c_int = 1 << 3;

/// `XML_ELEMENT_NODE` from libxml2's `xmlElementType`
const XML_ELEMENT_NODE: c_int = 1;

/// Schematron `pattern` elements that libxml2 would drop for lacking an `id` or `name`
const ANONYMOUS_PATTERNS_XPATH: &CStr = c"//*[local-name()='pattern'][namespace-uri()='http://purl.oclc.org/dsdl/schematron' or namespace-uri()='http://www.ascc.net/xml/schematron'][not(@id) and not(@name)]";

/// `XML_SCHEMATRONV_ASSERT` from libxml2's `xmlParserErrors`
pub const SCHEMATRON_ASSERT_CODE: i32 = 4000;
/// `XML_SCHEMATRONV_REPORT` from libxml2's `xmlParserErrors`
pub const SCHEMATRON_REPORT_CODE: i32 = 4001;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

/// Leading fields shared by `xmlNode`, `xmlAttr` and `xmlDoc`; nothing past `name` is read
#[repr(C)]
pub struct XmlNode {
    _private: *mut c_void,
    node_type: c_int,
    name: *const c_char,
}

#[repr(C)]
pub struct XmlNodeSet {
    node_nr: c_int,
    _node_max: c_int,
    node_tab: *mut *mut XmlNode,
}

/// Leading fields of `xmlXPathObject`
#[repr(C)]
pub struct XmlXPathObject {
    _object_type: c_int,
    nodesetval: *mut XmlNodeSet,
}

#[repr(C)]
pub struct XmlXPathContext {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlRelaxNG {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlRelaxNGParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlRelaxNGValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchematron {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchematronParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchematronValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    pub fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);

    // Documents
    pub fn xmlReadFile(filename: *const c_char, encoding: *const c_char, options: c_int)
    -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);
    pub fn xmlSetProp(node: *mut XmlNode, name: *const c_char, value: *const c_char) -> *mut c_void;

    // XPath
    pub fn xmlXPathNewContext(doc: *mut XmlDoc) -> *mut XmlXPathContext;
    pub fn xmlXPathFreeContext(ctxt: *mut XmlXPathContext);
    pub fn xmlXPathEval(expr: *const c_char, ctxt: *mut XmlXPathContext) -> *mut XmlXPathObject;
    pub fn xmlXPathFreeObject(obj: *mut XmlXPathObject);

    // RELAX NG
    pub fn xmlRelaxNGNewParserCtxt(url: *const c_char) -> *mut XmlRelaxNGParserCtxt;
    pub fn xmlRelaxNGSetParserStructuredErrors(
        ctxt: *mut XmlRelaxNGParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlRelaxNGParse(ctxt: *mut XmlRelaxNGParserCtxt) -> *mut XmlRelaxNG;
    pub fn xmlRelaxNGFreeParserCtxt(ctxt: *mut XmlRelaxNGParserCtxt);
    pub fn xmlRelaxNGFree(schema: *mut XmlRelaxNG);
    pub fn xmlRelaxNGNewValidCtxt(schema: *mut XmlRelaxNG) -> *mut XmlRelaxNGValidCtxt;
    pub fn xmlRelaxNGSetValidStructuredErrors(
        ctxt: *mut XmlRelaxNGValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlRelaxNGValidateDoc(ctxt: *mut XmlRelaxNGValidCtxt, doc: *mut XmlDoc) -> c_int;
    pub fn xmlRelaxNGFreeValidCtxt(ctxt: *mut XmlRelaxNGValidCtxt);

    // Schematron
    pub fn xmlSchematronNewDocParserCtxt(doc: *mut XmlDoc) -> *mut XmlSchematronParserCtxt;
    pub fn xmlSchematronParse(ctxt: *mut XmlSchematronParserCtxt) -> *mut XmlSchematron;
    pub fn xmlSchematronFreeParserCtxt(ctxt: *mut XmlSchematronParserCtxt);
    pub fn xmlSchematronFree(schema: *mut XmlSchematron);
    pub fn xmlSchematronNewValidCtxt(
        schema: *mut XmlSchematron,
        options: c_int,
    ) -> *mut XmlSchematronValidCtxt;
    pub fn xmlSchematronSetValidStructuredErrors(
        ctxt: *mut XmlSchematronValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchematronValidateDoc(ctxt: *mut XmlSchematronValidCtxt, doc: *mut XmlDoc) -> c_int;
    pub fn xmlSchematronFreeValidCtxt(ctxt: *mut XmlSchematronValidCtxt);
}

/// Severity of an event as libxml2 reports it (`xmlErrorLevel`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum XmlErrorLevel {
    Warning,
    Error,
    Fatal,
}

impl XmlErrorLevel {
    fn from_raw(level: c_int) -> Option<Self> {
        match level {
            1 => Some(XmlErrorLevel::Warning),
            2 => Some(XmlErrorLevel::Error),
            3 => Some(XmlErrorLevel::Fatal),
            _ => None,
        }
    }
}

/// One event surfaced by libxml2 through the structured error handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlEvent {
    pub level: XmlErrorLevel,
    pub domain: i32,
    pub code: i32,
    pub line: u32,
    /// Column where the engine knows it, 0 otherwise
    pub column: u32,
    /// Name of the element the event was raised on, if any
    pub element: Option<String>,
    pub message: String,
}

unsafe fn element_name(node: *mut c_void) -> Option<String> {
    if node.is_null() {
        return None;
    }
    let node = unsafe { &*(node as *const XmlNode) };
    if node.node_type != XML_ELEMENT_NODE || node.name.is_null() {
        return None;
    }
    Some(
        unsafe { CStr::from_ptr(node.name) }
            .to_string_lossy()
            .into_owned(),
    )
}

/// Callback for libxml2 to report events (structured)
unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *mut xmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }

    let events = unsafe { &mut *(user_data as *mut Vec<XmlEvent>) };
    let error = unsafe { &*error };

    let Some(level) = XmlErrorLevel::from_raw(error.level) else {
        return;
    };

    let message = if error.message.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(error.message) }
            .to_string_lossy()
            .trim()
            .to_string()
    };

    events.push(XmlEvent {
        level,
        domain: error.domain,
        code: error.code,
        line: error.line.max(0) as u32,
        column: error.int2.max(0) as u32,
        element: unsafe { element_name(error.node) },
        message,
    });
}

/// Run `f` with libxml2's thread-local structured error handler pointed at a fresh
/// collector. The collector pointer is also handed to `f` so that contexts with their
/// own handler slot can report into the same list.
fn with_error_collector<T>(f: impl FnOnce(*mut c_void) -> T) -> (T, Vec<XmlEvent>) {
    struct HandlerReset;

    impl Drop for HandlerReset {
        fn drop(&mut self) {
            unsafe { xmlSetStructuredErrorFunc(std::ptr::null_mut(), None) };
        }
    }

    let mut events: Vec<XmlEvent> = Vec::new();
    let ctx = &mut events as *mut Vec<XmlEvent> as *mut c_void;

    let value = {
        let _reset = HandlerReset;
        unsafe { xmlSetStructuredErrorFunc(ctx, Some(structured_error_callback)) };
        f(ctx)
    };

    (value, events)
}

fn path_to_cstring(path: &Path) -> LibXml2Result<CString> {
    path.to_str()
        .and_then(|s| CString::new(s).ok())
        .ok_or_else(|| LibXml2Error::InvalidPath {
            path: path.to_path_buf(),
        })
}

fn summarize(events: &[XmlEvent]) -> String {
    events
        .iter()
        .filter(|e| e.level >= XmlErrorLevel::Error)
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Give every anonymous Schematron `pattern` in `doc` a generated `id`.
/// Returns how many were named.
unsafe fn name_anonymous_patterns(doc: &XmlDocument) -> LibXml2Result<usize> {
    let xpath_ctxt = unsafe { xmlXPathNewContext(doc.as_ptr()) };
    if xpath_ctxt.is_null() {
        return Err(LibXml2Error::MemoryAllocation);
    }

    let mut named = 0;
    unsafe {
        let object = xmlXPathEval(ANONYMOUS_PATTERNS_XPATH.as_ptr(), xpath_ctxt);
        if !object.is_null() {
            let nodes = (*object).nodesetval;
            if !nodes.is_null() && !(*nodes).node_tab.is_null() {
                for i in 0..(*nodes).node_nr.max(0) as usize {
                    let node = *(*nodes).node_tab.add(i);
                    let id = format!("anonymous-pattern-{}\0", i + 1);
                    xmlSetProp(node, c"id".as_ptr(), id.as_ptr() as *const c_char);
                    named += 1;
                }
            }
            xmlXPathFreeObject(object);
        }
        xmlXPathFreeContext(xpath_ctxt);
    }

    Ok(named)
}

/// Parsed XML document, freed on drop
pub struct XmlDocument {
    ptr: *mut XmlDoc,
    _phantom: PhantomData<XmlDoc>,
}

impl XmlDocument {
    fn as_ptr(&self) -> *mut XmlDoc {
        self.ptr
    }
}

impl Drop for XmlDocument {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { xmlFreeDoc(self.ptr) };
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Result of reading a document: the tree if it was well-formed enough to build one,
/// plus every event the parser raised on the way.
pub struct DocumentLoad {
    pub document: Option<XmlDocument>,
    pub events: Vec<XmlEvent>,
}

/// Compiled RELAX NG grammar, freed on drop
pub struct RelaxNgSchema {
    ptr: *mut XmlRelaxNG,
    _phantom: PhantomData<XmlRelaxNG>,
}

impl Drop for RelaxNgSchema {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { xmlRelaxNGFree(self.ptr) };
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Compiled Schematron rule-set, freed on drop.
///
/// The compiled form points into the rule-set tree, so the tree is owned here and
/// released only after the schema (fields drop after `Drop::drop`).
pub struct SchematronSchema {
    ptr: *mut XmlSchematron,
    _source: XmlDocument,
    _phantom: PhantomData<XmlSchematron>,
}

impl Drop for SchematronSchema {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { xmlSchematronFree(self.ptr) };
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// LibXML2 wrapper providing safe access to the parser and both validation engines
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    /// Create a new wrapper, initializing libxml2 on first use
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Read a document from disk, collecting every parser event.
    ///
    /// A document that is not well-formed yields `document: None` together with the
    /// fatal events explaining why.
    pub fn read_document(&self, path: &Path, options: c_int) -> LibXml2Result<DocumentLoad> {
        let c_path = path_to_cstring(path)?;

        let (ptr, events) = with_error_collector(|_| unsafe {
            xmlReadFile(
                c_path.as_ptr(),
                std::ptr::null(),
                options | XML_PARSE_BIG_LINES,
            )
        });

        let document = if ptr.is_null() {
            None
        } else {
            Some(XmlDocument {
                ptr,
                _phantom: PhantomData,
            })
        };

        Ok(DocumentLoad { document, events })
    }

    /// Load and compile a RELAX NG grammar from a file
    pub fn parse_relaxng(&self, path: &Path) -> LibXml2Result<RelaxNgSchema> {
        let c_path = path_to_cstring(path)?;

        let (ptr, events) = with_error_collector(|ctx| unsafe {
            let parser_ctxt = xmlRelaxNGNewParserCtxt(c_path.as_ptr());
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }

            xmlRelaxNGSetParserStructuredErrors(parser_ctxt, Some(structured_error_callback), ctx);
            let schema = xmlRelaxNGParse(parser_ctxt);
            xmlRelaxNGFreeParserCtxt(parser_ctxt);
            Ok(schema)
        });
        let ptr = ptr?;

        if ptr.is_null() {
            return Err(LibXml2Error::RelaxNgParseFailed {
                path: path.to_path_buf(),
                details: summarize(&events),
            });
        }

        Ok(RelaxNgSchema {
            ptr,
            _phantom: PhantomData,
        })
    }

    /// Validate a parsed document against a RELAX NG grammar.
    ///
    /// Returns every event the engine raised, in emission order. An engine-internal
    /// failure (negative return code) is an error.
    pub fn validate_relaxng(
        &self,
        schema: &RelaxNgSchema,
        document: &XmlDocument,
        file: &Path,
    ) -> LibXml2Result<(i32, Vec<XmlEvent>)> {
        let (code, events) = with_error_collector(|ctx| unsafe {
            let valid_ctxt = xmlRelaxNGNewValidCtxt(schema.ptr);
            if valid_ctxt.is_null() {
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            xmlRelaxNGSetValidStructuredErrors(valid_ctxt, Some(structured_error_callback), ctx);
            let code = xmlRelaxNGValidateDoc(valid_ctxt, document.as_ptr());
            xmlRelaxNGFreeValidCtxt(valid_ctxt);
            Ok(code)
        });
        let code = code?;

        if code < 0 {
            return Err(LibXml2Error::ValidationFailed {
                code,
                file: file.to_path_buf(),
            });
        }

        Ok((code, events))
    }

    /// Load and compile a Schematron rule-set from a file.
    ///
    /// The rule-set is read as a tree first and every `pattern` without an `id` or
    /// `name` gets a generated `id`, since libxml2 only compiles named patterns.
    /// The rule-set must be well-formed XML in a Schematron namespace with at least
    /// one rule, otherwise parsing fails.
    pub fn parse_schematron(&self, path: &Path) -> LibXml2Result<SchematronSchema> {
        let c_path = path_to_cstring(path)?;

        let (compiled, events) = with_error_collector(|_| unsafe {
            let doc = xmlReadFile(
                c_path.as_ptr(),
                std::ptr::null(),
                XML_PARSE_NOENT | XML_PARSE_NONET | XML_PARSE_BIG_LINES,
            );
            if doc.is_null() {
                return Ok(None);
            }
            let source = XmlDocument {
                ptr: doc,
                _phantom: PhantomData,
            };

            let named = name_anonymous_patterns(&source)?;
            if named > 0 {
                tracing::debug!(file = %path.display(), patterns = named, "named anonymous Schematron patterns");
            }

            let parser_ctxt = xmlSchematronNewDocParserCtxt(source.as_ptr());
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }
            let schema = xmlSchematronParse(parser_ctxt);
            xmlSchematronFreeParserCtxt(parser_ctxt);

            if schema.is_null() {
                return Ok(None);
            }
            Ok(Some(SchematronSchema {
                ptr: schema,
                _source: source,
                _phantom: PhantomData,
            }))
        });

        compiled?.ok_or_else(|| LibXml2Error::SchematronParseFailed {
            path: path.to_path_buf(),
            details: summarize(&events),
        })
    }

    /// Apply a Schematron rule-set to a parsed document.
    ///
    /// Failed assertions and successful reports both come back as events, told apart
    /// by [`SCHEMATRON_ASSERT_CODE`] and [`SCHEMATRON_REPORT_CODE`].
    pub fn validate_schematron(
        &self,
        schema: &SchematronSchema,
        document: &XmlDocument,
        file: &Path,
    ) -> LibXml2Result<Vec<XmlEvent>> {
        // XPath failures inside rule tests go through the thread-local handler,
        // so it points at the same collector as the validation context
        let (code, events) = with_error_collector(|ctx| unsafe {
            let valid_ctxt = xmlSchematronNewValidCtxt(schema.ptr, XML_SCHEMATRON_OUT_ERROR);
            if valid_ctxt.is_null() {
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            xmlSchematronSetValidStructuredErrors(valid_ctxt, Some(structured_error_callback), ctx);
            let code = xmlSchematronValidateDoc(valid_ctxt, document.as_ptr());
            xmlSchematronFreeValidCtxt(valid_ctxt);
            Ok(code)
        });
        let code = code?;

        if code < 0 {
            return Err(LibXml2Error::ValidationFailed {
                code,
                file: file.to_path_buf(),
            });
        }

        Ok(events)
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SIMPLE_RNG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<element name="root" xmlns="http://relaxng.org/ns/structure/1.0">
  <element name="item"><text/></element>
</element>"#;

    const SIMPLE_SCH: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<schema xmlns="http://purl.oclc.org/dsdl/schematron">
  <pattern>
    <rule context="item">
      <assert test="string-length(.) &gt; 0">An item must not be empty.</assert>
    </rule>
  </pattern>
</schema>"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_libxml2_wrapper_creation() {
        let wrapper = LibXml2Wrapper::new();
        drop(wrapper);
        let _again = LibXml2Wrapper::default();
    }

    #[test]
    fn test_error_level_mapping() {
        assert_eq!(XmlErrorLevel::from_raw(0), None);
        assert_eq!(XmlErrorLevel::from_raw(1), Some(XmlErrorLevel::Warning));
        assert_eq!(XmlErrorLevel::from_raw(2), Some(XmlErrorLevel::Error));
        assert_eq!(XmlErrorLevel::from_raw(3), Some(XmlErrorLevel::Fatal));
        assert!(XmlErrorLevel::Fatal > XmlErrorLevel::Warning);
    }

    #[test]
    fn test_read_well_formed_document() {
        let dir = TempDir::new().unwrap();
        let doc = write(&dir, "doc.xml", "<root><item>a</item></root>");

        let load = LibXml2Wrapper::new().read_document(&doc, 0).unwrap();
        assert!(load.document.is_some());
        assert!(load.events.is_empty());
    }

    #[test]
    fn test_read_malformed_document_reports_fatal_event() {
        let dir = TempDir::new().unwrap();
        let doc = write(&dir, "doc.xml", "<root>\n<item>a</root>\n");

        let load = LibXml2Wrapper::new().read_document(&doc, 0).unwrap();
        assert!(load.document.is_none());
        assert!(!load.events.is_empty());
        assert!(load.events.iter().any(|e| e.level == XmlErrorLevel::Fatal));
        assert!(load.events.iter().all(|e| e.line >= 1));
    }

    #[test]
    fn test_relaxng_parse_and_validate() {
        let dir = TempDir::new().unwrap();
        let rng = write(&dir, "g.rng", SIMPLE_RNG);
        let good = write(&dir, "good.xml", "<root><item>a</item></root>");
        let bad = write(&dir, "bad.xml", "<root>\n  <other/>\n</root>");

        let wrapper = LibXml2Wrapper::new();
        let schema = wrapper.parse_relaxng(&rng).unwrap();

        let good_doc = wrapper.read_document(&good, 0).unwrap().document.unwrap();
        let (code, events) = wrapper.validate_relaxng(&schema, &good_doc, &good).unwrap();
        assert_eq!(code, 0);
        assert!(events.is_empty());

        let bad_doc = wrapper.read_document(&bad, 0).unwrap().document.unwrap();
        let (code, events) = wrapper.validate_relaxng(&schema, &bad_doc, &bad).unwrap();
        assert!(code > 0);
        assert!(!events.is_empty());
    }

    #[test]
    fn test_relaxng_parse_failure() {
        let dir = TempDir::new().unwrap();
        let rng = write(&dir, "broken.rng", "<element name=\"root\"");

        let result = LibXml2Wrapper::new().parse_relaxng(&rng);
        match result {
            Err(LibXml2Error::RelaxNgParseFailed { path, .. }) => assert_eq!(path, rng),
            other => panic!("Expected RelaxNgParseFailed, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_schematron_failed_assert_is_reported() {
        let dir = TempDir::new().unwrap();
        let sch = write(&dir, "r.sch", SIMPLE_SCH);
        let doc = write(&dir, "doc.xml", "<root>\n<item>a</item>\n<item/>\n</root>");

        let wrapper = LibXml2Wrapper::new();
        let schema = wrapper.parse_schematron(&sch).unwrap();
        let document = wrapper.read_document(&doc, 0).unwrap().document.unwrap();
        let events = wrapper.validate_schematron(&schema, &document, &doc).unwrap();

        let asserts: Vec<_> = events
            .iter()
            .filter(|e| e.code == SCHEMATRON_ASSERT_CODE)
            .collect();
        assert_eq!(asserts.len(), 1);
        assert!(asserts[0].message.contains("An item must not be empty."));
    }

    #[test]
    fn test_schematron_named_and_anonymous_patterns_both_run() {
        let dir = TempDir::new().unwrap();
        let sch = write(
            &dir,
            "mixed.sch",
            r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron">
  <pattern id="named">
    <rule context="entry"><assert test="true()">Never fires.</assert></rule>
  </pattern>
  <pattern>
    <rule context="entry"><assert test="@id">Every entry needs an id.</assert></rule>
  </pattern>
  <pattern>
    <rule context="entry"><assert test="@lang">Every entry needs a lang.</assert></rule>
  </pattern>
</schema>"#,
        );
        let doc = write(&dir, "doc.xml", "<glossary><entry/></glossary>");

        let wrapper = LibXml2Wrapper::new();
        let schema = wrapper.parse_schematron(&sch).unwrap();
        let document = wrapper.read_document(&doc, 0).unwrap().document.unwrap();
        let events = wrapper.validate_schematron(&schema, &document, &doc).unwrap();

        let messages: Vec<&str> = events
            .iter()
            .filter(|e| e.code == SCHEMATRON_ASSERT_CODE)
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(messages.len(), 2, "{:?}", messages);
        assert!(messages.iter().any(|m| m.contains("Every entry needs an id.")));
        assert!(messages.iter().any(|m| m.contains("Every entry needs a lang.")));
    }

    #[test]
    fn test_schematron_only_anonymous_patterns_on_valid_document() {
        let dir = TempDir::new().unwrap();
        let sch = write(&dir, "r.sch", SIMPLE_SCH);
        let doc = write(&dir, "doc.xml", "<root><item>a</item></root>");

        let wrapper = LibXml2Wrapper::new();
        let schema = wrapper.parse_schematron(&sch).unwrap();
        let document = wrapper.read_document(&doc, 0).unwrap().document.unwrap();
        let events = wrapper.validate_schematron(&schema, &document, &doc).unwrap();
        assert!(events.is_empty(), "{:?}", events);
    }

    #[test]
    fn test_relaxng_events_carry_element_name() {
        let dir = TempDir::new().unwrap();
        let rng = write(&dir, "g.rng", SIMPLE_RNG);
        let bad = write(&dir, "bad.xml", "<root>\n  <other/>\n</root>");

        let wrapper = LibXml2Wrapper::new();
        let schema = wrapper.parse_relaxng(&rng).unwrap();
        let bad_doc = wrapper.read_document(&bad, 0).unwrap().document.unwrap();
        let (_, events) = wrapper.validate_relaxng(&schema, &bad_doc, &bad).unwrap();
        assert!(events.iter().any(|e| e.element.is_some()));
    }

    #[test]
    fn test_schematron_parse_failure() {
        let dir = TempDir::new().unwrap();
        let sch = write(&dir, "broken.sch", "<schema xmlns=\"http://purl.oclc.org/dsdl/schematron\"><pattern>");

        let result = LibXml2Wrapper::new().parse_schematron(&sch);
        assert!(matches!(
            result,
            Err(LibXml2Error::SchematronParseFailed { .. })
        ));
    }

    #[test]
    fn test_invalid_path_is_rejected() {
        let result = LibXml2Wrapper::new().parse_relaxng(Path::new("bad\0name.rng"));
        assert!(matches!(result, Err(LibXml2Error::InvalidPath { .. })));
    }

    #[test]
    fn test_handler_is_reset_after_collection() {
        let dir = TempDir::new().unwrap();
        let bad = write(&dir, "bad.xml", "<root>");
        let wrapper = LibXml2Wrapper::new();

        let first = wrapper.read_document(&bad, 0).unwrap();
        let second = wrapper.read_document(&bad, 0).unwrap();

        // each call collects only its own events
        assert_eq!(first.events.len(), second.events.len());
    }
}
