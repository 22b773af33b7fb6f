// Runtime-facing type definitions
//
// Identifiers and descriptors shared between the engine and the runtime collaborator

use serde::{Deserialize, Serialize};
use std::fmt;

// Object IDs are opaque 8-byte handles handed out by the runtime
pub type ObjectId = u64;
pub type ThreadId = ObjectId;

pub type ReferenceTypeId = u64;
pub type MethodId = u64;
pub type FieldId = u64;
pub type FrameId = u64;

// JVM access flags we care about when propagating to subclasses
pub const ACC_PRIVATE: i32 = 0x0002;
pub const ACC_STATIC: i32 = 0x0008;
pub const ACC_FINAL: i32 = 0x0010;

/// Identifier of a breakpoint inside a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BreakpointId(pub u32);

impl fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bp_{}", self.0)
    }
}

/// Identifier the runtime assigned to a registered request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub i32);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req_{}", self.0)
    }
}

/// A loaded (prepared) reference type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub type_id: ReferenceTypeId,
    /// Binary name with dots, e.g. `com.example.Foo$Inner`
    pub name: String,
    /// Names of every supertype and implemented interface, transitively
    pub supertypes: Vec<String>,
    pub mod_bits: i32,
}

impl TypeInfo {
    pub fn is_final(&self) -> bool {
        self.mod_bits & ACC_FINAL != 0
    }

    pub fn is_subtype_of(&self, name: &str) -> bool {
        self.supertypes.iter().any(|s| s == name)
    }
}

/// Method information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub method_id: MethodId,
    pub name: String,
    pub signature: String,
    pub mod_bits: i32,
}

impl MethodInfo {
    pub fn is_private(&self) -> bool {
        self.mod_bits & ACC_PRIVATE != 0
    }

    pub fn is_final(&self) -> bool {
        self.mod_bits & ACC_FINAL != 0
    }

    pub fn is_static(&self) -> bool {
        self.mod_bits & ACC_STATIC != 0
    }
}

/// Field information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub field_id: FieldId,
    pub name: String,
    pub signature: String,
    pub mod_bits: i32,
}

impl FieldInfo {
    pub fn is_private(&self) -> bool {
        self.mod_bits & ACC_PRIVATE != 0
    }

    pub fn is_final(&self) -> bool {
        self.mod_bits & ACC_FINAL != 0
    }
}

// Location identifies a code position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub class_id: ReferenceTypeId,
    pub method_id: MethodId,
    pub index: u64, // bytecode index (PC)
    pub line: Option<u32>,
}

/// Declared source position of a breakpoint (1-based line)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Stack frame as seen by the filter chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub frame_id: FrameId,
    pub location: Location,
    pub declaring_type: String,
    pub method_name: String,
    pub method_signature: String,
    pub source_file: Option<String>,
    /// `this` of the frame, `None` in static methods
    pub this_object: Option<ObjectId>,
}

impl Frame {
    /// Key used by caller filters: `declaring.Type#method(signature)`
    pub fn method_key(&self) -> String {
        format!(
            "{}#{}{}",
            self.declaring_type, self.method_name, self.method_signature
        )
    }

    /// Caller key without the signature: `declaring.Type#method`
    pub fn short_method_key(&self) -> String {
        format!("{}#{}", self.declaring_type, self.method_name)
    }
}

// Tagged value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Int(i64),
    Double(f64),
    Char(char),
    Str(String),
    Object { id: ObjectId, type_name: String },
    Null,
    Void,
}

impl Value {
    /// Format value for display
    pub fn format(&self) -> String {
        match self {
            Value::Boolean(v) => format!("(boolean) {}", v),
            Value::Int(v) => format!("(int) {}", v),
            Value::Double(v) => format!("(double) {}", v),
            Value::Char(v) => format!("(char) '{}'", v),
            Value::Str(v) => format!("\"{}\"", v),
            Value::Object { id, type_name } => format!("({}) @{:x}", type_name, id),
            Value::Null => "(object) null".to_string(),
            Value::Void => "(void)".to_string(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}
