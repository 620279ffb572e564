//! # Morph Script Compiler
//!
//! Compiles mapping definitions into a metamorph XML script for the rule
//! engine.
//!
//! ## Output shape
//!
//! ```xml
//! <metamorph xmlns=… xmlns:xsi=… xsi:schemaLocation=… entityMarker="." version="1">
//!   <meta><name>first, second</name></meta>
//!   <rules>
//!     <data source="…" name="…">
//!       <component param="value"><nested …/></component>
//!     </data>
//!   </rules>
//! </metamorph>
//! ```
//!
//! A parameter with `data` becomes an attribute of the current element; a
//! `repeat` parameter becomes a child element built from its own parameters.
//! Attribute and element order follow the definition order exactly, so the
//! same input always renders to the same bytes.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const METAMORPH_NS: &str = "http://www.culturegraph.org/metamorph";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.culturegraph.org/metamorph metamorph.xsd";

// =============================================================================
// MAPPING DEFINITIONS
// =============================================================================

/// A reference to a source or target attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRef {
    pub name: String,
}

/// One mapping from a source attribute to a target attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    pub name: Option<String>,
    pub source: AttributeRef,
    pub target: AttributeRef,
    #[serde(default)]
    pub components: Vec<Component>,
}

/// A function applied inside a transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: Option<String>,
    pub payload: Option<Payload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// A named scalar (`data`) or a nested group (`repeat`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: Option<String>,
    pub data: Option<String>,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Parameter {
    #[must_use]
    pub fn data(name: &str, value: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            data: Some(value.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn repeat(name: &str, parameters: Vec<Parameter>) -> Self {
        Self {
            name: Some(name.to_string()),
            repeat: true,
            parameters,
            ..Self::default()
        }
    }
}

/// Errors raised while compiling a script. No partial script is produced.
#[derive(Debug, Error)]
pub enum MorphError {
    #[error("Transformation #{transformation} has no name")]
    MissingName { transformation: usize },

    #[error("Transformation '{transformation}': component #{position} has no name")]
    MissingComponentName {
        transformation: String,
        position: usize,
    },

    #[error("Transformation '{transformation}': component '{component}' has no payload")]
    MissingPayload {
        transformation: String,
        component: String,
    },

    #[error("Transformation '{transformation}': component '{component}' has an unnamed parameter")]
    MissingParameterName {
        transformation: String,
        component: String,
    },

    #[error("XML error: {0}")]
    Xml(String),
}

// =============================================================================
// SCRIPT TREE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<usize>,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }
}

/// A compiled script: an element arena rooted at index 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphScript {
    elements: Vec<Element>,
}

impl MorphScript {
    fn add(&mut self, parent: Option<usize>, element: Element) -> usize {
        let idx = self.elements.len();
        self.elements.push(element);
        if let Some(parent) = parent {
            self.elements[parent].children.push(idx);
        }
        idx
    }

    /// Serialise to XML: compact, or indented by four spaces.
    pub fn render(&self, indent: bool) -> Result<String, MorphError> {
        let mut writer = if indent {
            Writer::new_with_indent(Vec::new(), b' ', 4)
        } else {
            Writer::new(Vec::new())
        };

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| MorphError::Xml(e.to_string()))?;

        enum Step {
            Open(usize),
            Close(usize),
        }

        let mut steps = vec![Step::Open(0)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Open(idx) => {
                    let element = &self.elements[idx];
                    let mut start = BytesStart::new(element.name.as_str());
                    for (key, value) in &element.attributes {
                        start.push_attribute((key.as_str(), value.as_str()));
                    }

                    if element.children.is_empty() && element.text.is_none() {
                        writer
                            .write_event(Event::Empty(start))
                            .map_err(|e| MorphError::Xml(e.to_string()))?;
                        continue;
                    }

                    writer
                        .write_event(Event::Start(start))
                        .map_err(|e| MorphError::Xml(e.to_string()))?;
                    if let Some(text) = &element.text {
                        writer
                            .write_event(Event::Text(BytesText::new(text)))
                            .map_err(|e| MorphError::Xml(e.to_string()))?;
                    }
                    steps.push(Step::Close(idx));
                    steps.extend(element.children.iter().rev().map(|&c| Step::Open(c)));
                }
                Step::Close(idx) => {
                    writer
                        .write_event(Event::End(BytesEnd::new(self.elements[idx].name.as_str())))
                        .map_err(|e| MorphError::Xml(e.to_string()))?;
                }
            }
        }

        String::from_utf8(writer.into_inner()).map_err(|e| MorphError::Xml(e.to_string()))
    }
}

impl std::fmt::Display for MorphScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let xml = self.render(true).map_err(|_| std::fmt::Error)?;
        f.write_str(&xml)
    }
}

// =============================================================================
// COMPILER
// =============================================================================

/// Compile transformations, in order, into one script.
pub fn compile(transformations: &[Transformation]) -> Result<MorphScript, MorphError> {
    let mut script = MorphScript {
        elements: Vec::new(),
    };

    let mut root = Element::new("metamorph");
    root.attributes = vec![
        ("xmlns".to_string(), METAMORPH_NS.to_string()),
        ("xmlns:xsi".to_string(), XSI_NS.to_string()),
        ("xsi:schemaLocation".to_string(), SCHEMA_LOCATION.to_string()),
        ("entityMarker".to_string(), ".".to_string()),
        ("version".to_string(), "1".to_string()),
    ];
    let root = script.add(None, root);
    let meta = script.add(Some(root), Element::new("meta"));
    let meta_name = script.add(Some(meta), Element::new("name"));
    let rules = script.add(Some(root), Element::new("rules"));

    let mut names = Vec::with_capacity(transformations.len());
    for (position, transformation) in transformations.iter().enumerate() {
        let name = transformation
            .name
            .as_deref()
            .ok_or(MorphError::MissingName {
                transformation: position,
            })?;
        names.push(name);

        let mut data = Element::new("data");
        data.attributes = vec![
            ("source".to_string(), transformation.source.name.clone()),
            ("name".to_string(), transformation.target.name.clone()),
        ];
        let data = script.add(Some(rules), data);

        for (component_position, component) in transformation.components.iter().enumerate() {
            add_component(&mut script, data, name, component_position, component)?;
        }
    }

    script.elements[meta_name].text = Some(names.join(", "));
    Ok(script)
}

/// Build one component element and its parameter tree.
fn add_component(
    script: &mut MorphScript,
    parent: usize,
    transformation: &str,
    position: usize,
    component: &Component,
) -> Result<(), MorphError> {
    let name = component
        .name
        .as_deref()
        .ok_or_else(|| MorphError::MissingComponentName {
            transformation: transformation.to_string(),
            position,
        })?;
    let payload = component
        .payload
        .as_ref()
        .ok_or_else(|| MorphError::MissingPayload {
            transformation: transformation.to_string(),
            component: name.to_string(),
        })?;

    let element = script.add(Some(parent), Element::new(name));
    let mut pending: Vec<(usize, &[Parameter])> =
        vec![(element, payload.parameters.as_slice())];

    while let Some((current, parameters)) = pending.pop() {
        for parameter in parameters {
            let key = parameter
                .name
                .as_deref()
                .ok_or_else(|| MorphError::MissingParameterName {
                    transformation: transformation.to_string(),
                    component: name.to_string(),
                })?;

            if let Some(value) = &parameter.data {
                script.elements[current]
                    .attributes
                    .push((key.to_string(), value.clone()));
            } else if parameter.repeat {
                let child = script.add(Some(current), Element::new(key));
                pending.push((child, parameter.parameters.as_slice()));
            }
        }
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
