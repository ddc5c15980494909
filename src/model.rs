//! In-memory class model: constant pool, members, attributes, stack maps.
//!
//! This is the representation both directions of the notation operate on.
//! Binary marshalling of the model to and from `.class` bytes is out of
//! scope; the pool exposes insert-or-reuse operations because re-parsing
//! re-adds every referenced symbol and must not create duplicate slots.

use bitflags::bitflags;

use crate::opcodes::Instruction;

bitflags! {
    /// JVM access flags shared by classes, fields and methods.
    #[derive(Default)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

/// Canonical textual names per flag bit, with the method/field spellings of
/// the shared bits accepted as aliases on input.
const FLAG_NAMES: &[(&str, AccessFlags)] = &[
    ("public", AccessFlags::PUBLIC),
    ("private", AccessFlags::PRIVATE),
    ("protected", AccessFlags::PROTECTED),
    ("static", AccessFlags::STATIC),
    ("final", AccessFlags::FINAL),
    ("super", AccessFlags::SUPER),
    ("volatile", AccessFlags::VOLATILE),
    ("transient", AccessFlags::TRANSIENT),
    ("native", AccessFlags::NATIVE),
    ("interface", AccessFlags::INTERFACE),
    ("abstract", AccessFlags::ABSTRACT),
    ("strict", AccessFlags::STRICT),
    ("synthetic", AccessFlags::SYNTHETIC),
    ("annotation", AccessFlags::ANNOTATION),
    ("enum", AccessFlags::ENUM),
    ("synchronized", AccessFlags::SUPER),
    ("bridge", AccessFlags::VOLATILE),
    ("varargs", AccessFlags::TRANSIENT),
];

impl AccessFlags {
    /// Resolves one textual flag name, including aliases.
    pub fn from_name(name: &str) -> Option<AccessFlags> {
        FLAG_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, flag)| *flag)
    }

    /// Canonical names of all set bits, in declaration order.
    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut seen = AccessFlags::empty();
        for (name, flag) in FLAG_NAMES {
            if self.contains(*flag) && !seen.contains(*flag) {
                names.push(*name);
                seen |= *flag;
            }
        }
        names
    }
}

/// One slot of the constant pool.
///
/// Indices are 1-based as in the class file format; index 0 and the slot
/// following a `Long`/`Double` are `Unusable`.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Unusable,
}

impl PoolEntry {
    /// Equality used for insert-or-reuse. Floats compare by bit pattern so
    /// NaN payloads still deduplicate.
    fn same_as(&self, other: &PoolEntry) -> bool {
        match (self, other) {
            (PoolEntry::Float(a), PoolEntry::Float(b)) => a.to_bits() == b.to_bits(),
            (PoolEntry::Double(a), PoolEntry::Double(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

/// The class file's deduplicated table of symbolic and constant values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
}

impl ConstantPool {
    /// Number of occupied slots, unusable ones included.
    pub fn len(&self) -> u16 {
        self.entries.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PoolEntry> {
        self.entries.iter()
    }

    /// Entry at a 1-based index, or `None` for index 0 and out-of-range.
    pub fn entry(&self, index: u16) -> Option<&PoolEntry> {
        if index == 0 {
            return None;
        }
        self.entries.get(index as usize - 1)
    }

    /// Insert-or-reuse: returns the index of an existing identical entry,
    /// or appends the entry and returns its new index. `Long` and `Double`
    /// occupy a trailing unusable slot as in the binary format.
    pub fn insert(&mut self, entry: PoolEntry) -> u16 {
        if let Some(position) = self.entries.iter().position(|e| e.same_as(&entry)) {
            return (position + 1) as u16;
        }
        let two_slots = matches!(entry, PoolEntry::Long(_) | PoolEntry::Double(_));
        self.entries.push(entry);
        let index = self.entries.len() as u16;
        if two_slots {
            self.entries.push(PoolEntry::Unusable);
        }
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        self.insert(PoolEntry::Utf8(value.to_owned()))
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.insert(PoolEntry::Class { name_index })
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let string_index = self.utf8(value);
        self.insert(PoolEntry::String { string_index })
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.insert(PoolEntry::NameAndType { name_index, descriptor_index })
    }

    /// The string payload of a `Utf8` entry.
    pub fn utf8_at(&self, index: u16) -> Option<&str> {
        match self.entry(index) {
            Some(PoolEntry::Utf8(value)) => Some(value),
            _ => None,
        }
    }

    /// The name of a `Class` entry, resolved through its `Utf8` reference.
    pub fn class_name_at(&self, index: u16) -> Option<&str> {
        match self.entry(index) {
            Some(PoolEntry::Class { name_index }) => self.utf8_at(*name_index),
            _ => None,
        }
    }
}

/// A named, possibly nested, metadata block attached to the class, a
/// member, or another attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Code(CodeAttribute),
    StackMapTable(StackMapTableAttribute),
    /// Any attribute the notation has no structured form for; its payload
    /// round-trips as a hex literal.
    Raw(RawAttribute),
}

impl Attribute {
    /// Attribute name as written in the textual form.
    pub fn name<'a>(&'a self, pool: &'a ConstantPool) -> Option<&'a str> {
        match self {
            Attribute::Code(_) => Some("Code"),
            Attribute::StackMapTable(_) => Some("StackMapTable"),
            Attribute::Raw(raw) => pool.utf8_at(raw.name_index),
        }
    }

    /// Nested child attributes; always empty for raw attributes, which are
    /// terminal leaves.
    pub fn children(&self) -> &[Attribute] {
        match self {
            Attribute::Code(code) => &code.attributes,
            Attribute::StackMapTable(table) => &table.attributes,
            Attribute::Raw(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<Instruction>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackMapTableAttribute {
    pub frames: Vec<StackMapFrame>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name_index: u16,
    pub info: Vec<u8>,
}

/// Stack map frames, keyed by their textual type token.
#[derive(Debug, Clone, PartialEq)]
pub enum StackMapFrame {
    Same { offset: u16 },
    SameExtended { offset: u16 },
    SameLocals1StackItem { offset: u16, stack: VerificationType },
    SameLocals1StackItemExtended { offset: u16, stack: VerificationType },
    Chop { offset: u16, absent: u8 },
    Append { offset: u16, locals: Vec<VerificationType> },
    Full { offset: u16, locals: Vec<VerificationType>, stack: Vec<VerificationType> },
}

impl StackMapFrame {
    pub fn type_name(&self) -> &'static str {
        match self {
            StackMapFrame::Same { .. } => "same",
            StackMapFrame::SameExtended { .. } => "same-extended",
            StackMapFrame::SameLocals1StackItem { .. } => "same-locals-1-stack-item",
            StackMapFrame::SameLocals1StackItemExtended { .. } => {
                "same-locals-1-stack-item-extended"
            }
            StackMapFrame::Chop { .. } => "chop",
            StackMapFrame::Append { .. } => "append",
            StackMapFrame::Full { .. } => "full",
        }
    }

    pub fn offset(&self) -> u16 {
        match self {
            StackMapFrame::Same { offset }
            | StackMapFrame::SameExtended { offset }
            | StackMapFrame::SameLocals1StackItem { offset, .. }
            | StackMapFrame::SameLocals1StackItemExtended { offset, .. }
            | StackMapFrame::Chop { offset, .. }
            | StackMapFrame::Append { offset, .. }
            | StackMapFrame::Full { offset, .. } => *offset,
        }
    }
}

/// A stack map frame operand describing the type of a value at a bytecode
/// offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    /// Constant pool index of the `Class` entry.
    Object(u16),
    /// Bytecode offset of the `new` instruction that created the value.
    UninitializedVariable(u16),
}

/// A field declaration: flags, name, descriptor and attached attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldModel {
    pub access_flags: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

/// A method declaration, structurally identical to a field but kept as its
/// own type because the two lists are distinct in the class file.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodModel {
    pub access_flags: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

/// The complete in-memory class representation the notation round-trips.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassModel {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: AccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldModel>,
    pub methods: Vec<MethodModel>,
    pub attributes: Vec<Attribute>,
}

impl Default for ClassModel {
    fn default() -> Self {
        ClassModel {
            minor_version: 0,
            major_version: 0,
            constant_pool: ConstantPool::default(),
            access_flags: AccessFlags::empty(),
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }
}
