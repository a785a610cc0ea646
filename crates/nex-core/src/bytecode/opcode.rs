//! Bytecode Opcode Definitions
//!
//! Defines the raw opcode set of format version 3 images.
//! This file contains no execution semantics.
//! Opcode values are fixed by the compiler and must never be renumbered.

/// Bytecode opcodes (format 3)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Immediate and address pushes
    PushB = 0,
    PushN = 1,
    PushS = 2,
    PushY = 3,
    PushPg = 4,
    PushPpg = 5,
    PushPmg = 6,
    PushPl = 7,
    PushPol = 8,
    PushI = 9,

    // Loads through a reference
    LoadB = 10,
    LoadN = 11,
    LoadS = 12,
    LoadY = 13,
    LoadA = 14,
    LoadD = 15,
    LoadP = 16,
    LoadJ = 17,
    LoadV = 18,

    // Stores through a reference
    StoreB = 19,
    StoreN = 20,
    StoreS = 21,
    StoreY = 22,
    StoreA = 23,
    StoreD = 24,
    StoreP = 25,
    StoreJ = 26,
    StoreV = 27,

    // Arithmetic
    NegN = 28,
    AddN = 29,
    SubN = 30,
    MulN = 31,
    DivN = 32,
    ModN = 33,
    ExpN = 34,

    // Comparison
    EqB = 35,
    NeB = 36,
    EqN = 37,
    NeN = 38,
    LtN = 39,
    GtN = 40,
    LeN = 41,
    GeN = 42,
    EqS = 43,
    NeS = 44,
    LtS = 45,
    GtS = 46,
    LeS = 47,
    GeS = 48,
    EqY = 49,
    NeY = 50,
    LtY = 51,
    GtY = 52,
    LeY = 53,
    GeY = 54,
    EqA = 55,
    NeA = 56,
    EqD = 57,
    NeD = 58,
    EqP = 59,
    NeP = 60,
    EqV = 61,
    NeV = 62,

    // Boolean logic
    AndB = 63,
    OrB = 64,
    NotB = 65,

    // Indexing and membership
    IndexAr = 66,
    IndexAw = 67,
    IndexAv = 68,
    IndexAn = 69,
    IndexDr = 70,
    IndexDw = 71,
    IndexDv = 72,
    InA = 73,
    InD = 74,

    // Calls and control flow
    CallP = 75,
    CallF = 76,
    CallMf = 77,
    CallI = 78,
    Jump = 79,
    Jf = 80,
    Jt = 81,

    // Stack shuffling
    Dup = 82,
    DupX1 = 83,
    Drop = 84,
    Ret = 85,

    // Construction
    ConsA = 86,
    ConsD = 87,
    Except = 88,
    Alloc = 89,
    PushNil = 90,
    ResetC = 91,
    PushPeg = 92,
    JumpTbl = 93,
    CallX = 94,
    Swap = 95,
    DropN = 96,
    PushFp = 97,
    CallV = 98,
    PushCi = 99,
}

/// Shape of the operands that follow an opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    /// One raw byte (`PUSHB`)
    Byte,
    /// One variable-length integer
    One,
    /// Two variable-length integers
    Two,
    /// Three variable-length integers
    Three,
}

impl Opcode {
    /// Every opcode, in numeric order
    pub const ALL: [Opcode; 100] = [
        Opcode::PushB, Opcode::PushN, Opcode::PushS, Opcode::PushY,
        Opcode::PushPg, Opcode::PushPpg, Opcode::PushPmg, Opcode::PushPl,
        Opcode::PushPol, Opcode::PushI,
        Opcode::LoadB, Opcode::LoadN, Opcode::LoadS, Opcode::LoadY,
        Opcode::LoadA, Opcode::LoadD, Opcode::LoadP, Opcode::LoadJ, Opcode::LoadV,
        Opcode::StoreB, Opcode::StoreN, Opcode::StoreS, Opcode::StoreY,
        Opcode::StoreA, Opcode::StoreD, Opcode::StoreP, Opcode::StoreJ, Opcode::StoreV,
        Opcode::NegN, Opcode::AddN, Opcode::SubN, Opcode::MulN, Opcode::DivN,
        Opcode::ModN, Opcode::ExpN,
        Opcode::EqB, Opcode::NeB, Opcode::EqN, Opcode::NeN, Opcode::LtN,
        Opcode::GtN, Opcode::LeN, Opcode::GeN,
        Opcode::EqS, Opcode::NeS, Opcode::LtS, Opcode::GtS, Opcode::LeS, Opcode::GeS,
        Opcode::EqY, Opcode::NeY, Opcode::LtY, Opcode::GtY, Opcode::LeY, Opcode::GeY,
        Opcode::EqA, Opcode::NeA, Opcode::EqD, Opcode::NeD,
        Opcode::EqP, Opcode::NeP, Opcode::EqV, Opcode::NeV,
        Opcode::AndB, Opcode::OrB, Opcode::NotB,
        Opcode::IndexAr, Opcode::IndexAw, Opcode::IndexAv, Opcode::IndexAn,
        Opcode::IndexDr, Opcode::IndexDw, Opcode::IndexDv, Opcode::InA, Opcode::InD,
        Opcode::CallP, Opcode::CallF, Opcode::CallMf, Opcode::CallI,
        Opcode::Jump, Opcode::Jf, Opcode::Jt,
        Opcode::Dup, Opcode::DupX1, Opcode::Drop, Opcode::Ret,
        Opcode::ConsA, Opcode::ConsD, Opcode::Except, Opcode::Alloc,
        Opcode::PushNil, Opcode::ResetC, Opcode::PushPeg, Opcode::JumpTbl,
        Opcode::CallX, Opcode::Swap, Opcode::DropN, Opcode::PushFp,
        Opcode::CallV, Opcode::PushCi,
    ];

    /// Convert raw byte to opcode
    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Operand layout following the opcode byte
    pub fn operands(self) -> Operands {
        use Opcode::*;
        match self {
            PushB => Operands::Byte,

            PushN | PushS | PushY | PushPg | PushPpg | PushPl | PushI
            | CallP | CallF | Jump | Jf | Jt | ConsA | ConsD | Except
            | Alloc | PushPeg | JumpTbl | DropN | PushFp | CallV | PushCi => Operands::One,

            PushPmg | PushPol | CallMf => Operands::Two,

            CallX => Operands::Three,

            _ => Operands::None,
        }
    }

    /// Assembler mnemonic, as printed by the disassembler
    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            PushB => "PUSHB", PushN => "PUSHN", PushS => "PUSHS", PushY => "PUSHY",
            PushPg => "PUSHPG", PushPpg => "PUSHPPG", PushPmg => "PUSHPMG",
            PushPl => "PUSHPL", PushPol => "PUSHPOL", PushI => "PUSHI",
            LoadB => "LOADB", LoadN => "LOADN", LoadS => "LOADS", LoadY => "LOADY",
            LoadA => "LOADA", LoadD => "LOADD", LoadP => "LOADP", LoadJ => "LOADJ",
            LoadV => "LOADV",
            StoreB => "STOREB", StoreN => "STOREN", StoreS => "STORES", StoreY => "STOREY",
            StoreA => "STOREA", StoreD => "STORED", StoreP => "STOREP", StoreJ => "STOREJ",
            StoreV => "STOREV",
            NegN => "NEGN", AddN => "ADDN", SubN => "SUBN", MulN => "MULN",
            DivN => "DIVN", ModN => "MODN", ExpN => "EXPN",
            EqB => "EQB", NeB => "NEB", EqN => "EQN", NeN => "NEN", LtN => "LTN",
            GtN => "GTN", LeN => "LEN", GeN => "GEN",
            EqS => "EQS", NeS => "NES", LtS => "LTS", GtS => "GTS", LeS => "LES", GeS => "GES",
            EqY => "EQY", NeY => "NEY", LtY => "LTY", GtY => "GTY", LeY => "LEY", GeY => "GEY",
            EqA => "EQA", NeA => "NEA", EqD => "EQD", NeD => "NED",
            EqP => "EQP", NeP => "NEP", EqV => "EQV", NeV => "NEV",
            AndB => "ANDB", OrB => "ORB", NotB => "NOTB",
            IndexAr => "INDEXAR", IndexAw => "INDEXAW", IndexAv => "INDEXAV",
            IndexAn => "INDEXAN", IndexDr => "INDEXDR", IndexDw => "INDEXDW",
            IndexDv => "INDEXDV", InA => "INA", InD => "IND",
            CallP => "CALLP", CallF => "CALLF", CallMf => "CALLMF", CallI => "CALLI",
            Jump => "JUMP", Jf => "JF", Jt => "JT",
            Dup => "DUP", DupX1 => "DUPX1", Drop => "DROP", Ret => "RET",
            ConsA => "CONSA", ConsD => "CONSD", Except => "EXCEPT", Alloc => "ALLOC",
            PushNil => "PUSHNIL", ResetC => "RESETC", PushPeg => "PUSHPEG",
            JumpTbl => "JUMPTBL", CallX => "CALLX", Swap => "SWAP", DropN => "DROPN",
            PushFp => "PUSHFP", CallV => "CALLV", PushCi => "PUSHCI",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_is_dense() {
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(*op as u8 as usize, i, "{} out of place", op.mnemonic());
            assert_eq!(Opcode::from_u8(i as u8), Some(*op));
        }
        assert_eq!(Opcode::from_u8(100), None);
    }

    #[test]
    fn operand_shapes() {
        assert_eq!(Opcode::PushB.operands(), Operands::Byte);
        assert_eq!(Opcode::PushPol.operands(), Operands::Two);
        assert_eq!(Opcode::CallX.operands(), Operands::Three);
        assert_eq!(Opcode::Ret.operands(), Operands::None);
        assert_eq!(Opcode::JumpTbl.operands(), Operands::One);
    }
}
