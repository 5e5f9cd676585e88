//! ISAPI camera protocol client
//! Namespace-aware XML documents
//!
//! Device payloads are small configuration documents whose root's default
//! namespace tells which schema generation is in play. Documents are parsed
//! into an owned, mutable tree so a caller can read, patch and write them
//! back during one read-modify-write sequence. Child lookups are made in the
//! parent's namespace, so patch helpers work the same on either generation.

use quick_xml::escape::escape;
use quick_xml::events::{ BytesStart, Event };
use quick_xml::Reader;
use std::fmt;
use thiserror::Error;

/// Marker found in the namespace URI of the newer schema generation
pub const VERSIONED_SCHEMA_MARKER: &str = "ver20";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Custom error types for XML handling
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML syntax error: {0}")] Syntax(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")] Attribute(
        #[from] quick_xml::events::attributes::AttrError,
    ),

    #[error("Document has no root element")]
    MissingRoot,

    #[error("Document has more than one root element")]
    MultipleRoots,

    #[error("Element <{name}> is never closed")] Unclosed {
        name: String,
    },
}

/// An element with its resolved namespace
///
/// Device payloads carry no mixed content, so an element keeps its own
/// character data in `text` and its element children in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    prefix: Option<String>,
    name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    /// New unprefixed element in the given namespace
    pub fn new(name: &str, namespace: Option<&str>) -> Self {
        Self {
            prefix: None,
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Local name, without any prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    fn matches(&self, name: &str, namespace: Option<&str>) -> bool {
        self.name == name && self.namespace.as_deref() == namespace
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => {
                *existing = value.to_string();
            }
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter()
    }

    /// Concatenated text content of this element and its descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.collect_text(out);
        }
    }

    /// Replace all content with a single text value
    pub fn set_text(&mut self, value: &str) {
        self.children.clear();
        self.text = value.to_string();
    }

    /// First child with `name` in this element's namespace
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        let namespace = self.namespace.as_deref();
        self.children.iter().find(|c| c.matches(name, namespace))
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        let namespace = self.namespace.as_deref();
        self.children.iter_mut().find(|c| c.matches(name, namespace))
    }

    /// Text of a direct child, if the child exists
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(XmlElement::text)
    }

    /// Append a child node as-is, keeping its own namespace
    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// Get the named child, creating it (in this namespace) if absent
    pub fn ensure(&mut self, name: &str) -> &mut XmlElement {
        let namespace = self.namespace.as_deref();
        let index = match self.children.iter().position(|c| c.matches(name, namespace)) {
            Some(index) => index,
            None => {
                let created = XmlElement::new(name, namespace);
                self.children.push(created);
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Set a leaf value, creating the leaf if needed
    pub fn set_or_add(&mut self, name: &str, value: &str) -> &mut XmlElement {
        let element = self.ensure(name);
        element.set_text(value);
        element
    }

    /// Remove the first child with `name`, returning it
    pub fn remove_if_exists(&mut self, name: &str) -> Option<XmlElement> {
        let namespace = self.namespace.as_deref();
        let position = self.children.iter().position(|c| c.matches(name, namespace))?;
        Some(self.children.remove(position))
    }

    /// Ensure `container/leaf` exists and set the leaf value
    pub fn ensure_path(&mut self, container: &str, leaf: &str, value: &str) -> &mut XmlElement {
        self.ensure(container).set_or_add(leaf, value)
    }

    /// Depth-first search for the first descendant whose local name matches
    /// `name`, ignoring ASCII case and namespace
    pub fn find_descendant_ignore_case(&self, name: &str) -> Option<&XmlElement> {
        for child in self.children() {
            if child.name.eq_ignore_ascii_case(name) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant_ignore_case(name) {
                return Some(found);
            }
        }
        None
    }

    /// First descendant named `name` in this element's namespace
    pub fn find_descendant(&self, name: &str) -> Option<&XmlElement> {
        fn walk<'a>(
            children: &'a [XmlElement],
            name: &str,
            namespace: Option<&str>
        ) -> Option<&'a XmlElement> {
            children.iter().find_map(|child| {
                if child.matches(name, namespace) {
                    Some(child)
                } else {
                    walk(&child.children, name, namespace)
                }
            })
        }
        walk(&self.children, name, self.namespace.as_deref())
    }

    /// Mutable variant of [`XmlElement::find_descendant`]
    pub fn find_descendant_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        fn walk<'a>(
            children: &'a mut [XmlElement],
            name: &str,
            namespace: Option<&str>
        ) -> Option<&'a mut XmlElement> {
            children.iter_mut().find_map(|child| {
                if child.matches(name, namespace) {
                    Some(child)
                } else {
                    walk(&mut child.children, name, namespace)
                }
            })
        }
        let namespace = self.namespace.clone();
        walk(&mut self.children, name, namespace.as_deref())
    }

    /// Writes this subtree. `inherited_default` is the default namespace in
    /// effect at the parent and `bound_prefixes` the prefix declarations
    /// visible there.
    fn write_to<'a>(
        &'a self,
        out: &mut String,
        inherited_default: Option<&'a str>,
        bound_prefixes: &[(&'a str, &'a str)]
    ) {
        let qualified = self.qualified_name();
        out.push('<');
        out.push_str(&qualified);

        let mut scope_default = inherited_default;
        if self.prefix.is_none() && self.namespace.as_deref() != inherited_default {
            out.push_str(" xmlns=\"");
            out.push_str(&escape(self.namespace.as_deref().unwrap_or("")));
            out.push('"');
            scope_default = self.namespace.as_deref();
        }

        let mut prefixes = bound_prefixes.to_vec();
        for (key, value) in &self.attributes {
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                prefixes.push((prefix, value.as_str()));
            }
        }

        // a detached prefixed subtree must carry its own declaration
        if let (Some(prefix), Some(namespace)) = (self.prefix.as_deref(), self.namespace.as_deref()) {
            let declared_here = self.attributes
                .iter()
                .any(|(key, _)| key.strip_prefix("xmlns:") == Some(prefix));
            let bound = bound_prefixes
                .iter()
                .rev()
                .find(|(p, _)| *p == prefix)
                .map(|(_, ns)| *ns);
            if !declared_here && bound != Some(namespace) {
                out.push_str(" xmlns:");
                out.push_str(prefix);
                out.push_str("=\"");
                out.push_str(&escape(namespace));
                out.push('"');
                prefixes.push((prefix, namespace));
            }
        }

        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }

        if self.text.is_empty() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        out.push_str(&escape(self.text.as_str()));
        for child in &self.children {
            child.write_to(out, scope_default, &prefixes);
        }
        out.push_str("</");
        out.push_str(&qualified);
        out.push('>');
    }
}

/// True if the root follows the newer (versioned) schema generation
pub fn is_versioned_schema(root: &XmlElement) -> bool {
    root.namespace()
        .map(|ns| ns.to_ascii_lowercase().contains(VERSIONED_SCHEMA_MARKER))
        .unwrap_or(false)
}

/// A whole XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
}

#[derive(Debug, Clone, Default)]
struct NamespaceScope {
    default_namespace: Option<String>,
    prefixes: Vec<(String, String)>,
}

impl NamespaceScope {
    fn resolve(&self, prefix: &str) -> Option<String> {
        self.prefixes
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.clone())
    }
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// The minimal document used for empty 2xx bodies
    pub fn empty_response() -> Self {
        Self::new(XmlElement::new("Response", None))
    }

    pub fn parse(input: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<(XmlElement, NamespaceScope)> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let parent_scope = stack.last().map(|(_, scope)| scope.clone()).unwrap_or_default();
                    let (element, scope) = element_from_start(&start, &parent_scope)?;
                    stack.push((element, scope));
                }
                Event::Empty(start) => {
                    let parent_scope = stack.last().map(|(_, scope)| scope.clone()).unwrap_or_default();
                    let (element, _) = element_from_start(&start, &parent_scope)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    if let Some((element, _)) = stack.pop() {
                        attach(&mut stack, &mut root, element)?;
                    }
                }
                Event::Text(text) => {
                    let value = text.unescape()?;
                    if let Some((parent, _)) = stack.last_mut() {
                        parent.text.push_str(&value);
                    }
                }
                Event::CData(data) => {
                    if let Some((parent, _)) = stack.last_mut() {
                        parent.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => {
                    break;
                }
                _ => {}
            }
        }

        if let Some((unclosed, _)) = stack.pop() {
            return Err(XmlError::Unclosed { name: unclosed.qualified_name() });
        }

        root.map(Self::new).ok_or(XmlError::MissingRoot)
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut XmlElement {
        &mut self.root
    }

    pub fn into_root(self) -> XmlElement {
        self.root
    }

    /// Default namespace of the root element
    pub fn namespace(&self) -> Option<&str> {
        self.root.namespace()
    }

    pub fn is_versioned_schema(&self) -> bool {
        is_versioned_schema(&self.root)
    }

    /// Compact serialization prefixed with the UTF-8 declaration, as sent on the wire
    pub fn to_xml_string(&self) -> String {
        let mut out = String::from(XML_DECLARATION);
        out.push('\n');
        self.root.write_to(&mut out, None, &[]);
        out
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.root.write_to(&mut out, None, &[]);
        f.write_str(&out)
    }
}

impl std::str::FromStr for XmlDocument {
    type Err = XmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn element_from_start(
    start: &BytesStart<'_>,
    parent_scope: &NamespaceScope
) -> Result<(XmlElement, NamespaceScope), XmlError> {
    let mut scope = parent_scope.clone();
    let mut attributes = Vec::new();

    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();

        if key == "xmlns" {
            scope.default_namespace = if value.is_empty() { None } else { Some(value) };
        } else {
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                scope.prefixes.push((prefix.to_string(), value.clone()));
            }
            attributes.push((key, value));
        }
    }

    let raw_name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let (prefix, name) = match raw_name.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, raw_name),
    };
    let namespace = match &prefix {
        Some(prefix) => scope.resolve(prefix),
        None => scope.default_namespace.clone(),
    };

    let element = XmlElement {
        prefix,
        name,
        namespace,
        attributes,
        text: String::new(),
        children: Vec::new(),
    };
    Ok((element, scope))
}

fn attach(
    stack: &mut [(XmlElement, NamespaceScope)],
    root: &mut Option<XmlElement>,
    element: XmlElement
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some((parent, _)) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(XmlError::MultipleRoots),
    }
}
