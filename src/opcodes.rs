//! JVM opcode table and instruction records.

/// A single JVM opcode byte.
///
/// The crate does not interpret instructions beyond what the textual form
/// needs: the mnemonic table, and which opcodes carry a branch offset or a
/// constant pool index in their operand bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u8);

/// One instruction: the opcode plus its already-encoded operand bytes.
///
/// The byte offset of an instruction inside a method body is the running
/// sum of the encoded sizes of the instructions before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<u8>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<u8>) -> Self {
        Instruction { opcode, operands }
    }

    /// Encoded size in bytes: one opcode byte plus the operands.
    pub fn size(&self) -> usize {
        1 + self.operands.len()
    }
}

impl Opcode {
    pub const NOP: Opcode = Opcode(0x00);
    pub const BIPUSH: Opcode = Opcode(0x10);
    pub const IFEQ: Opcode = Opcode(0x99);
    pub const GOTO: Opcode = Opcode(0xa7);
    pub const RETURN: Opcode = Opcode(0xb1);
    pub const GETSTATIC: Opcode = Opcode(0xb2);
    pub const INVOKEVIRTUAL: Opcode = Opcode(0xb6);
    pub const INVOKESTATIC: Opcode = Opcode(0xb8);
    pub const GOTO_W: Opcode = Opcode(0xc8);

    /// Lowercase mnemonic for this opcode byte, if it is a defined one.
    pub fn mnemonic(self) -> Option<&'static str> {
        MNEMONICS.get(self.0 as usize).copied()
    }

    /// Case-insensitive mnemonic lookup.
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        MNEMONICS
            .iter()
            .position(|m| m.eq_ignore_ascii_case(name))
            .map(|i| Opcode(i as u8))
    }

    /// Conditional and unconditional branches carrying a signed 16-bit
    /// offset relative to their own byte offset.
    pub fn is_branch(self) -> bool {
        matches!(self.0, 0x99..=0xa8 | 0xc6 | 0xc7)
    }

    /// `goto_w`/`jsr_w`, which carry a signed 32-bit offset instead.
    pub fn is_wide_branch(self) -> bool {
        matches!(self.0, 0xc8 | 0xc9)
    }

    /// Instructions whose two operand bytes are a constant pool index that
    /// the textual form renders through the pool entry codec.
    pub fn takes_pool_ref(self) -> bool {
        matches!(self.0, 0xb2..=0xb9 | 0xbb | 0xc0)
    }
}

/// Standard mnemonics indexed by opcode byte, 0x00 (`nop`) through 0xc9
/// (`jsr_w`).
static MNEMONICS: [&str; 0xca] = [
    "nop",
    "aconst_null",
    "iconst_m1",
    "iconst_0",
    "iconst_1",
    "iconst_2",
    "iconst_3",
    "iconst_4",
    "iconst_5",
    "lconst_0",
    "lconst_1",
    "fconst_0",
    "fconst_1",
    "fconst_2",
    "dconst_0",
    "dconst_1",
    "bipush",
    "sipush",
    "ldc",
    "ldc_w",
    "ldc2_w",
    "iload",
    "lload",
    "fload",
    "dload",
    "aload",
    "iload_0",
    "iload_1",
    "iload_2",
    "iload_3",
    "lload_0",
    "lload_1",
    "lload_2",
    "lload_3",
    "fload_0",
    "fload_1",
    "fload_2",
    "fload_3",
    "dload_0",
    "dload_1",
    "dload_2",
    "dload_3",
    "aload_0",
    "aload_1",
    "aload_2",
    "aload_3",
    "iaload",
    "laload",
    "faload",
    "daload",
    "aaload",
    "baload",
    "caload",
    "saload",
    "istore",
    "lstore",
    "fstore",
    "dstore",
    "astore",
    "istore_0",
    "istore_1",
    "istore_2",
    "istore_3",
    "lstore_0",
    "lstore_1",
    "lstore_2",
    "lstore_3",
    "fstore_0",
    "fstore_1",
    "fstore_2",
    "fstore_3",
    "dstore_0",
    "dstore_1",
    "dstore_2",
    "dstore_3",
    "astore_0",
    "astore_1",
    "astore_2",
    "astore_3",
    "iastore",
    "lastore",
    "fastore",
    "dastore",
    "aastore",
    "bastore",
    "castore",
    "sastore",
    "pop",
    "pop2",
    "dup",
    "dup_x1",
    "dup_x2",
    "dup2",
    "dup2_x1",
    "dup2_x2",
    "swap",
    "iadd",
    "ladd",
    "fadd",
    "dadd",
    "isub",
    "lsub",
    "fsub",
    "dsub",
    "imul",
    "lmul",
    "fmul",
    "dmul",
    "idiv",
    "ldiv",
    "fdiv",
    "ddiv",
    "irem",
    "lrem",
    "frem",
    "drem",
    "ineg",
    "lneg",
    "fneg",
    "dneg",
    "ishl",
    "lshl",
    "ishr",
    "lshr",
    "iushr",
    "lushr",
    "iand",
    "land",
    "ior",
    "lor",
    "ixor",
    "lxor",
    "iinc",
    "i2l",
    "i2f",
    "i2d",
    "l2i",
    "l2f",
    "l2d",
    "f2i",
    "f2l",
    "f2d",
    "d2i",
    "d2l",
    "d2f",
    "i2b",
    "i2c",
    "i2s",
    "lcmp",
    "fcmpl",
    "fcmpg",
    "dcmpl",
    "dcmpg",
    "ifeq",
    "ifne",
    "iflt",
    "ifge",
    "ifgt",
    "ifle",
    "if_icmpeq",
    "if_icmpne",
    "if_icmplt",
    "if_icmpge",
    "if_icmpgt",
    "if_icmple",
    "if_acmpeq",
    "if_acmpne",
    "goto",
    "jsr",
    "ret",
    "tableswitch",
    "lookupswitch",
    "ireturn",
    "lreturn",
    "freturn",
    "dreturn",
    "areturn",
    "return",
    "getstatic",
    "putstatic",
    "getfield",
    "putfield",
    "invokevirtual",
    "invokespecial",
    "invokestatic",
    "invokeinterface",
    "invokedynamic",
    "new",
    "newarray",
    "anewarray",
    "arraylength",
    "athrow",
    "checkcast",
    "instanceof",
    "monitorenter",
    "monitorexit",
    "wide",
    "multianewarray",
    "ifnull",
    "ifnonnull",
    "goto_w",
    "jsr_w",
];
