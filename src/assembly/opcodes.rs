//! CIL opcode table (ECMA-335, Partition III).
//!
//! Every opcode carries its encoded value, mnemonic, control-flow behaviour, the
//! stack-behaviour categories for the values it pops and pushes, and the kind of
//! inline operand it is encoded with. The table is the single source of truth for
//! the CFG builder and the stack-effect classifier.
//!
//! Single-byte opcodes have values `0x00`–`0xE0`; two-byte opcodes use the `0xFE`
//! prefix and are stored as `0xFEnn`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{EnumCount, EnumIter, IntoStaticStr};

use crate::assembly::{FlowType, OperandType, StackBehavior};

macro_rules! opcodes {
    ($( $variant:ident = $value:literal, $mnemonic:literal, $flow:ident, $pop:ident, $push:ident, $operand:ident; )*) => {
        /// A CIL opcode.
        ///
        /// Parsing and display use the ECMA-335 mnemonic (`"ldloc.s"`, `"callvirt"`, ...).
        ///
        /// # Examples
        ///
        /// ```rust
        /// use scil::assembly::{FlowType, OpCode, StackBehavior};
        ///
        /// let op: OpCode = "stfld".parse()?;
        /// assert_eq!(op, OpCode::Stfld);
        /// assert_eq!(op.value(), 0x7D);
        /// assert_eq!(op.pop_behavior(), StackBehavior::PoprefPop1);
        /// assert_eq!(OpCode::BrtrueS.flow_type(), FlowType::ConditionalBranch);
        /// # Ok::<(), scil::Error>(())
        /// ```
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount, IntoStaticStr)]
        pub enum OpCode {
            $(
                #[doc = concat!("`", $mnemonic, "`")]
                #[strum(serialize = $mnemonic)]
                $variant,
            )*
        }

        impl OpCode {
            /// Returns the encoded opcode value (`0xFEnn` for two-byte opcodes).
            #[must_use]
            pub const fn value(self) -> u16 {
                match self {
                    $( OpCode::$variant => $value, )*
                }
            }

            /// Returns how this opcode affects control flow.
            #[must_use]
            pub const fn flow_type(self) -> FlowType {
                match self {
                    $( OpCode::$variant => FlowType::$flow, )*
                }
            }

            /// Returns the stack-behaviour category of the values this opcode pops.
            #[must_use]
            pub const fn pop_behavior(self) -> StackBehavior {
                match self {
                    $( OpCode::$variant => StackBehavior::$pop, )*
                }
            }

            /// Returns the stack-behaviour category of the values this opcode pushes.
            #[must_use]
            pub const fn push_behavior(self) -> StackBehavior {
                match self {
                    $( OpCode::$variant => StackBehavior::$push, )*
                }
            }

            /// Returns the kind of inline operand this opcode is encoded with.
            #[must_use]
            pub const fn operand_type(self) -> OperandType {
                match self {
                    $( OpCode::$variant => OperandType::$operand, )*
                }
            }
        }

        impl FromStr for OpCode {
            type Err = crate::Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                match s {
                    $( $mnemonic => Ok(OpCode::$variant), )*
                    _ => Err(crate::Error::Input(format!("unknown CIL mnemonic `{s}`"))),
                }
            }
        }
    };
}

opcodes! {
    Nop = 0x00, "nop", Sequential, Pop0, Push0, None;
    Break = 0x01, "break", Sequential, Pop0, Push0, None;
    Ldarg0 = 0x02, "ldarg.0", Sequential, Pop0, Push1, None;
    Ldarg1 = 0x03, "ldarg.1", Sequential, Pop0, Push1, None;
    Ldarg2 = 0x04, "ldarg.2", Sequential, Pop0, Push1, None;
    Ldarg3 = 0x05, "ldarg.3", Sequential, Pop0, Push1, None;
    Ldloc0 = 0x06, "ldloc.0", Sequential, Pop0, Push1, None;
    Ldloc1 = 0x07, "ldloc.1", Sequential, Pop0, Push1, None;
    Ldloc2 = 0x08, "ldloc.2", Sequential, Pop0, Push1, None;
    Ldloc3 = 0x09, "ldloc.3", Sequential, Pop0, Push1, None;
    Stloc0 = 0x0A, "stloc.0", Sequential, Pop1, Push0, None;
    Stloc1 = 0x0B, "stloc.1", Sequential, Pop1, Push0, None;
    Stloc2 = 0x0C, "stloc.2", Sequential, Pop1, Push0, None;
    Stloc3 = 0x0D, "stloc.3", Sequential, Pop1, Push0, None;
    LdargS = 0x0E, "ldarg.s", Sequential, Pop0, Push1, UInt8;
    LdargaS = 0x0F, "ldarga.s", Sequential, Pop0, Pushi, UInt8;
    StargS = 0x10, "starg.s", Sequential, Pop1, Push0, UInt8;
    LdlocS = 0x11, "ldloc.s", Sequential, Pop0, Push1, UInt8;
    LdlocaS = 0x12, "ldloca.s", Sequential, Pop0, Pushi, UInt8;
    StlocS = 0x13, "stloc.s", Sequential, Pop1, Push0, UInt8;
    Ldnull = 0x14, "ldnull", Sequential, Pop0, Pushref, None;
    LdcI4M1 = 0x15, "ldc.i4.m1", Sequential, Pop0, Pushi, None;
    LdcI40 = 0x16, "ldc.i4.0", Sequential, Pop0, Pushi, None;
    LdcI41 = 0x17, "ldc.i4.1", Sequential, Pop0, Pushi, None;
    LdcI42 = 0x18, "ldc.i4.2", Sequential, Pop0, Pushi, None;
    LdcI43 = 0x19, "ldc.i4.3", Sequential, Pop0, Pushi, None;
    LdcI44 = 0x1A, "ldc.i4.4", Sequential, Pop0, Pushi, None;
    LdcI45 = 0x1B, "ldc.i4.5", Sequential, Pop0, Pushi, None;
    LdcI46 = 0x1C, "ldc.i4.6", Sequential, Pop0, Pushi, None;
    LdcI47 = 0x1D, "ldc.i4.7", Sequential, Pop0, Pushi, None;
    LdcI48 = 0x1E, "ldc.i4.8", Sequential, Pop0, Pushi, None;
    LdcI4S = 0x1F, "ldc.i4.s", Sequential, Pop0, Pushi, Int8;
    LdcI4 = 0x20, "ldc.i4", Sequential, Pop0, Pushi, Int32;
    LdcI8 = 0x21, "ldc.i8", Sequential, Pop0, Pushi8, Int64;
    LdcR4 = 0x22, "ldc.r4", Sequential, Pop0, Pushr4, Float32;
    LdcR8 = 0x23, "ldc.r8", Sequential, Pop0, Pushr8, Float64;
    Dup = 0x25, "dup", Sequential, Pop1, Push1Push1, None;
    Pop = 0x26, "pop", Sequential, Pop1, Push0, None;
    Jmp = 0x27, "jmp", Return, Pop0, Push0, Token;
    Call = 0x28, "call", Call, Varpop, Varpush, Token;
    Calli = 0x29, "calli", Call, Varpop, Varpush, Token;
    Ret = 0x2A, "ret", Return, Varpop, Push0, None;
    BrS = 0x2B, "br.s", UnconditionalBranch, Pop0, Push0, Int8;
    BrfalseS = 0x2C, "brfalse.s", ConditionalBranch, Popi, Push0, Int8;
    BrtrueS = 0x2D, "brtrue.s", ConditionalBranch, Popi, Push0, Int8;
    BeqS = 0x2E, "beq.s", ConditionalBranch, Pop1Pop1, Push0, Int8;
    BgeS = 0x2F, "bge.s", ConditionalBranch, Pop1Pop1, Push0, Int8;
    BgtS = 0x30, "bgt.s", ConditionalBranch, Pop1Pop1, Push0, Int8;
    BleS = 0x31, "ble.s", ConditionalBranch, Pop1Pop1, Push0, Int8;
    BltS = 0x32, "blt.s", ConditionalBranch, Pop1Pop1, Push0, Int8;
    BneUnS = 0x33, "bne.un.s", ConditionalBranch, Pop1Pop1, Push0, Int8;
    BgeUnS = 0x34, "bge.un.s", ConditionalBranch, Pop1Pop1, Push0, Int8;
    BgtUnS = 0x35, "bgt.un.s", ConditionalBranch, Pop1Pop1, Push0, Int8;
    BleUnS = 0x36, "ble.un.s", ConditionalBranch, Pop1Pop1, Push0, Int8;
    BltUnS = 0x37, "blt.un.s", ConditionalBranch, Pop1Pop1, Push0, Int8;
    Br = 0x38, "br", UnconditionalBranch, Pop0, Push0, Int32;
    Brfalse = 0x39, "brfalse", ConditionalBranch, Popi, Push0, Int32;
    Brtrue = 0x3A, "brtrue", ConditionalBranch, Popi, Push0, Int32;
    Beq = 0x3B, "beq", ConditionalBranch, Pop1Pop1, Push0, Int32;
    Bge = 0x3C, "bge", ConditionalBranch, Pop1Pop1, Push0, Int32;
    Bgt = 0x3D, "bgt", ConditionalBranch, Pop1Pop1, Push0, Int32;
    Ble = 0x3E, "ble", ConditionalBranch, Pop1Pop1, Push0, Int32;
    Blt = 0x3F, "blt", ConditionalBranch, Pop1Pop1, Push0, Int32;
    BneUn = 0x40, "bne.un", ConditionalBranch, Pop1Pop1, Push0, Int32;
    BgeUn = 0x41, "bge.un", ConditionalBranch, Pop1Pop1, Push0, Int32;
    BgtUn = 0x42, "bgt.un", ConditionalBranch, Pop1Pop1, Push0, Int32;
    BleUn = 0x43, "ble.un", ConditionalBranch, Pop1Pop1, Push0, Int32;
    BltUn = 0x44, "blt.un", ConditionalBranch, Pop1Pop1, Push0, Int32;
    Switch = 0x45, "switch", Switch, Popi, Push0, Switch;
    LdindI1 = 0x46, "ldind.i1", Sequential, Popi, Pushi, None;
    LdindU1 = 0x47, "ldind.u1", Sequential, Popi, Pushi, None;
    LdindI2 = 0x48, "ldind.i2", Sequential, Popi, Pushi, None;
    LdindU2 = 0x49, "ldind.u2", Sequential, Popi, Pushi, None;
    LdindI4 = 0x4A, "ldind.i4", Sequential, Popi, Pushi, None;
    LdindU4 = 0x4B, "ldind.u4", Sequential, Popi, Pushi, None;
    LdindI8 = 0x4C, "ldind.i8", Sequential, Popi, Pushi8, None;
    LdindI = 0x4D, "ldind.i", Sequential, Popi, Pushi, None;
    LdindR4 = 0x4E, "ldind.r4", Sequential, Popi, Pushr4, None;
    LdindR8 = 0x4F, "ldind.r8", Sequential, Popi, Pushr8, None;
    LdindRef = 0x50, "ldind.ref", Sequential, Popi, Pushref, None;
    StindRef = 0x51, "stind.ref", Sequential, PopiPopi, Push0, None;
    StindI1 = 0x52, "stind.i1", Sequential, PopiPopi, Push0, None;
    StindI2 = 0x53, "stind.i2", Sequential, PopiPopi, Push0, None;
    StindI4 = 0x54, "stind.i4", Sequential, PopiPopi, Push0, None;
    StindI8 = 0x55, "stind.i8", Sequential, PopiPopi8, Push0, None;
    StindR4 = 0x56, "stind.r4", Sequential, PopiPopr4, Push0, None;
    StindR8 = 0x57, "stind.r8", Sequential, PopiPopr8, Push0, None;
    Add = 0x58, "add", Sequential, Pop1Pop1, Push1, None;
    Sub = 0x59, "sub", Sequential, Pop1Pop1, Push1, None;
    Mul = 0x5A, "mul", Sequential, Pop1Pop1, Push1, None;
    Div = 0x5B, "div", Sequential, Pop1Pop1, Push1, None;
    DivUn = 0x5C, "div.un", Sequential, Pop1Pop1, Push1, None;
    Rem = 0x5D, "rem", Sequential, Pop1Pop1, Push1, None;
    RemUn = 0x5E, "rem.un", Sequential, Pop1Pop1, Push1, None;
    And = 0x5F, "and", Sequential, Pop1Pop1, Push1, None;
    Or = 0x60, "or", Sequential, Pop1Pop1, Push1, None;
    Xor = 0x61, "xor", Sequential, Pop1Pop1, Push1, None;
    Shl = 0x62, "shl", Sequential, Pop1Pop1, Push1, None;
    Shr = 0x63, "shr", Sequential, Pop1Pop1, Push1, None;
    ShrUn = 0x64, "shr.un", Sequential, Pop1Pop1, Push1, None;
    Neg = 0x65, "neg", Sequential, Pop1, Push1, None;
    Not = 0x66, "not", Sequential, Pop1, Push1, None;
    ConvI1 = 0x67, "conv.i1", Sequential, Pop1, Pushi, None;
    ConvI2 = 0x68, "conv.i2", Sequential, Pop1, Pushi, None;
    ConvI4 = 0x69, "conv.i4", Sequential, Pop1, Pushi, None;
    ConvI8 = 0x6A, "conv.i8", Sequential, Pop1, Pushi8, None;
    ConvR4 = 0x6B, "conv.r4", Sequential, Pop1, Pushr4, None;
    ConvR8 = 0x6C, "conv.r8", Sequential, Pop1, Pushr8, None;
    ConvU4 = 0x6D, "conv.u4", Sequential, Pop1, Pushi, None;
    ConvU8 = 0x6E, "conv.u8", Sequential, Pop1, Pushi8, None;
    Callvirt = 0x6F, "callvirt", Call, Varpop, Varpush, Token;
    Cpobj = 0x70, "cpobj", Sequential, PopiPopi, Push0, Token;
    Ldobj = 0x71, "ldobj", Sequential, Popi, Push1, Token;
    Ldstr = 0x72, "ldstr", Sequential, Pop0, Pushref, Token;
    Newobj = 0x73, "newobj", Call, Varpop, Pushref, Token;
    Castclass = 0x74, "castclass", Sequential, Popref, Pushref, Token;
    Isinst = 0x75, "isinst", Sequential, Popref, Pushi, Token;
    ConvRUn = 0x76, "conv.r.un", Sequential, Pop1, Pushr8, None;
    Unbox = 0x79, "unbox", Sequential, Popref, Pushi, Token;
    Throw = 0x7A, "throw", Throw, Popref, Push0, None;
    Ldfld = 0x7B, "ldfld", Sequential, Popref, Push1, Token;
    Ldflda = 0x7C, "ldflda", Sequential, Popref, Pushi, Token;
    Stfld = 0x7D, "stfld", Sequential, PoprefPop1, Push0, Token;
    Ldsfld = 0x7E, "ldsfld", Sequential, Pop0, Push1, Token;
    Ldsflda = 0x7F, "ldsflda", Sequential, Pop0, Pushi, Token;
    Stsfld = 0x80, "stsfld", Sequential, Pop1, Push0, Token;
    Stobj = 0x81, "stobj", Sequential, PopiPop1, Push0, Token;
    ConvOvfI1Un = 0x82, "conv.ovf.i1.un", Sequential, Pop1, Pushi, None;
    ConvOvfI2Un = 0x83, "conv.ovf.i2.un", Sequential, Pop1, Pushi, None;
    ConvOvfI4Un = 0x84, "conv.ovf.i4.un", Sequential, Pop1, Pushi, None;
    ConvOvfI8Un = 0x85, "conv.ovf.i8.un", Sequential, Pop1, Pushi8, None;
    ConvOvfU1Un = 0x86, "conv.ovf.u1.un", Sequential, Pop1, Pushi, None;
    ConvOvfU2Un = 0x87, "conv.ovf.u2.un", Sequential, Pop1, Pushi, None;
    ConvOvfU4Un = 0x88, "conv.ovf.u4.un", Sequential, Pop1, Pushi, None;
    ConvOvfU8Un = 0x89, "conv.ovf.u8.un", Sequential, Pop1, Pushi8, None;
    ConvOvfIUn = 0x8A, "conv.ovf.i.un", Sequential, Pop1, Pushi, None;
    ConvOvfUUn = 0x8B, "conv.ovf.u.un", Sequential, Pop1, Pushi, None;
    Box = 0x8C, "box", Sequential, Pop1, Pushref, Token;
    Newarr = 0x8D, "newarr", Sequential, Popi, Pushref, Token;
    Ldlen = 0x8E, "ldlen", Sequential, Popref, Pushi, None;
    Ldelema = 0x8F, "ldelema", Sequential, PoprefPopi, Pushi, Token;
    LdelemI1 = 0x90, "ldelem.i1", Sequential, PoprefPopi, Pushi, None;
    LdelemU1 = 0x91, "ldelem.u1", Sequential, PoprefPopi, Pushi, None;
    LdelemI2 = 0x92, "ldelem.i2", Sequential, PoprefPopi, Pushi, None;
    LdelemU2 = 0x93, "ldelem.u2", Sequential, PoprefPopi, Pushi, None;
    LdelemI4 = 0x94, "ldelem.i4", Sequential, PoprefPopi, Pushi, None;
    LdelemU4 = 0x95, "ldelem.u4", Sequential, PoprefPopi, Pushi, None;
    LdelemI8 = 0x96, "ldelem.i8", Sequential, PoprefPopi, Pushi8, None;
    LdelemI = 0x97, "ldelem.i", Sequential, PoprefPopi, Pushi, None;
    LdelemR4 = 0x98, "ldelem.r4", Sequential, PoprefPopi, Pushr4, None;
    LdelemR8 = 0x99, "ldelem.r8", Sequential, PoprefPopi, Pushr8, None;
    LdelemRef = 0x9A, "ldelem.ref", Sequential, PoprefPopi, Pushref, None;
    StelemI = 0x9B, "stelem.i", Sequential, PoprefPopiPopi, Push0, None;
    StelemI1 = 0x9C, "stelem.i1", Sequential, PoprefPopiPopi, Push0, None;
    StelemI2 = 0x9D, "stelem.i2", Sequential, PoprefPopiPopi, Push0, None;
    StelemI4 = 0x9E, "stelem.i4", Sequential, PoprefPopiPopi, Push0, None;
    StelemI8 = 0x9F, "stelem.i8", Sequential, PoprefPopiPopi8, Push0, None;
    StelemR4 = 0xA0, "stelem.r4", Sequential, PoprefPopiPopr4, Push0, None;
    StelemR8 = 0xA1, "stelem.r8", Sequential, PoprefPopiPopr8, Push0, None;
    StelemRef = 0xA2, "stelem.ref", Sequential, PoprefPopiPopref, Push0, None;
    LdelemAny = 0xA3, "ldelem", Sequential, PoprefPopi, Push1, Token;
    StelemAny = 0xA4, "stelem", Sequential, PoprefPopiPopref, Push0, Token;
    UnboxAny = 0xA5, "unbox.any", Sequential, Popref, Push1, Token;
    ConvOvfI1 = 0xB3, "conv.ovf.i1", Sequential, Pop1, Pushi, None;
    ConvOvfU1 = 0xB4, "conv.ovf.u1", Sequential, Pop1, Pushi, None;
    ConvOvfI2 = 0xB5, "conv.ovf.i2", Sequential, Pop1, Pushi, None;
    ConvOvfU2 = 0xB6, "conv.ovf.u2", Sequential, Pop1, Pushi, None;
    ConvOvfI4 = 0xB7, "conv.ovf.i4", Sequential, Pop1, Pushi, None;
    ConvOvfU4 = 0xB8, "conv.ovf.u4", Sequential, Pop1, Pushi, None;
    ConvOvfI8 = 0xB9, "conv.ovf.i8", Sequential, Pop1, Pushi8, None;
    ConvOvfU8 = 0xBA, "conv.ovf.u8", Sequential, Pop1, Pushi8, None;
    Refanyval = 0xC2, "refanyval", Sequential, Pop1, Pushi, Token;
    Ckfinite = 0xC3, "ckfinite", Sequential, Pop1, Pushr8, None;
    Mkrefany = 0xC6, "mkrefany", Sequential, Popi, Push1, Token;
    Ldtoken = 0xD0, "ldtoken", Sequential, Pop0, Pushi, Token;
    ConvU2 = 0xD1, "conv.u2", Sequential, Pop1, Pushi, None;
    ConvU1 = 0xD2, "conv.u1", Sequential, Pop1, Pushi, None;
    ConvI = 0xD3, "conv.i", Sequential, Pop1, Pushi, None;
    ConvOvfI = 0xD4, "conv.ovf.i", Sequential, Pop1, Pushi, None;
    ConvOvfU = 0xD5, "conv.ovf.u", Sequential, Pop1, Pushi, None;
    AddOvf = 0xD6, "add.ovf", Sequential, Pop1Pop1, Push1, None;
    AddOvfUn = 0xD7, "add.ovf.un", Sequential, Pop1Pop1, Push1, None;
    MulOvf = 0xD8, "mul.ovf", Sequential, Pop1Pop1, Push1, None;
    MulOvfUn = 0xD9, "mul.ovf.un", Sequential, Pop1Pop1, Push1, None;
    SubOvf = 0xDA, "sub.ovf", Sequential, Pop1Pop1, Push1, None;
    SubOvfUn = 0xDB, "sub.ovf.un", Sequential, Pop1Pop1, Push1, None;
    Endfinally = 0xDC, "endfinally", EndFinally, Pop0, Push0, None;
    Leave = 0xDD, "leave", Leave, PopAll, Push0, Int32;
    LeaveS = 0xDE, "leave.s", Leave, PopAll, Push0, Int8;
    StindI = 0xDF, "stind.i", Sequential, PopiPopi, Push0, None;
    ConvU = 0xE0, "conv.u", Sequential, Pop1, Pushi, None;
    Arglist = 0xFE00, "arglist", Sequential, Pop0, Pushi, None;
    Ceq = 0xFE01, "ceq", Sequential, Pop1Pop1, Pushi, None;
    Cgt = 0xFE02, "cgt", Sequential, Pop1Pop1, Pushi, None;
    CgtUn = 0xFE03, "cgt.un", Sequential, Pop1Pop1, Pushi, None;
    Clt = 0xFE04, "clt", Sequential, Pop1Pop1, Pushi, None;
    CltUn = 0xFE05, "clt.un", Sequential, Pop1Pop1, Pushi, None;
    Ldftn = 0xFE06, "ldftn", Sequential, Pop0, Pushi, Token;
    Ldvirtftn = 0xFE07, "ldvirtftn", Sequential, Popref, Pushi, Token;
    Ldarg = 0xFE09, "ldarg", Sequential, Pop0, Push1, UInt16;
    Ldarga = 0xFE0A, "ldarga", Sequential, Pop0, Pushi, UInt16;
    Starg = 0xFE0B, "starg", Sequential, Pop1, Push0, UInt16;
    Ldloc = 0xFE0C, "ldloc", Sequential, Pop0, Push1, UInt16;
    Ldloca = 0xFE0D, "ldloca", Sequential, Pop0, Pushi, UInt16;
    Stloc = 0xFE0E, "stloc", Sequential, Pop1, Push0, UInt16;
    Localloc = 0xFE0F, "localloc", Sequential, Popi, Pushi, None;
    Endfilter = 0xFE11, "endfilter", EndFinally, Popi, Push0, None;
    Unaligned = 0xFE12, "unaligned.", Sequential, Pop0, Push0, UInt8;
    Volatile = 0xFE13, "volatile.", Sequential, Pop0, Push0, None;
    Tail = 0xFE14, "tail.", Sequential, Pop0, Push0, None;
    Initobj = 0xFE15, "initobj", Sequential, Popi, Push0, Token;
    Constrained = 0xFE16, "constrained.", Sequential, Pop0, Push0, Token;
    Cpblk = 0xFE17, "cpblk", Sequential, PopiPopiPopi, Push0, None;
    Initblk = 0xFE18, "initblk", Sequential, PopiPopiPopi, Push0, None;
    No = 0xFE19, "no.", Sequential, Pop0, Push0, UInt8;
    Rethrow = 0xFE1A, "rethrow", Throw, Pop0, Push0, None;
    Sizeof = 0xFE1C, "sizeof", Sequential, Pop0, Pushi, Token;
    Refanytype = 0xFE1D, "refanytype", Sequential, Pop1, Pushi, None;
    Readonly = 0xFE1E, "readonly.", Sequential, Pop0, Push0, None;
}

impl OpCode {
    /// Returns the ECMA-335 mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Returns the encoded size of the opcode itself (1 or 2 bytes).
    #[must_use]
    pub const fn size(self) -> usize {
        if self.value() > 0xFF {
            2
        } else {
            1
        }
    }

    /// Returns `true` for `call`, `callvirt` and `calli`.
    #[must_use]
    pub const fn is_call(self) -> bool {
        matches!(self, OpCode::Call | OpCode::Callvirt | OpCode::Calli)
    }

    /// Returns `true` for prefix opcodes (`tail.`, `volatile.`, `constrained.`, ...).
    #[must_use]
    pub const fn is_prefix(self) -> bool {
        matches!(
            self,
            OpCode::Unaligned
                | OpCode::Volatile
                | OpCode::Tail
                | OpCode::Constrained
                | OpCode::No
                | OpCode::Readonly
        )
    }

    /// Maps a macro or short-form opcode onto its canonical long form.
    ///
    /// `ldloc.0`, `ldloc.s` and `ldloc` all map to [`OpCode::Ldloc`]; `br.s` maps to
    /// [`OpCode::Br`]; `ldc.i4.5` and `ldc.i4.s` map to [`OpCode::LdcI4`]. Opcodes without
    /// a short form map to themselves.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scil::assembly::OpCode;
    ///
    /// assert_eq!(OpCode::Stloc2.long_form(), OpCode::Stloc);
    /// assert_eq!(OpCode::BneUnS.long_form(), OpCode::BneUn);
    /// assert_eq!(OpCode::Add.long_form(), OpCode::Add);
    /// ```
    #[must_use]
    pub const fn long_form(self) -> OpCode {
        match self {
            OpCode::Ldarg0 | OpCode::Ldarg1 | OpCode::Ldarg2 | OpCode::Ldarg3 | OpCode::LdargS => {
                OpCode::Ldarg
            }
            OpCode::LdargaS => OpCode::Ldarga,
            OpCode::StargS => OpCode::Starg,
            OpCode::Ldloc0 | OpCode::Ldloc1 | OpCode::Ldloc2 | OpCode::Ldloc3 | OpCode::LdlocS => {
                OpCode::Ldloc
            }
            OpCode::LdlocaS => OpCode::Ldloca,
            OpCode::Stloc0 | OpCode::Stloc1 | OpCode::Stloc2 | OpCode::Stloc3 | OpCode::StlocS => {
                OpCode::Stloc
            }
            OpCode::LdcI4M1
            | OpCode::LdcI40
            | OpCode::LdcI41
            | OpCode::LdcI42
            | OpCode::LdcI43
            | OpCode::LdcI44
            | OpCode::LdcI45
            | OpCode::LdcI46
            | OpCode::LdcI47
            | OpCode::LdcI48
            | OpCode::LdcI4S => OpCode::LdcI4,
            OpCode::BrS => OpCode::Br,
            OpCode::BrfalseS => OpCode::Brfalse,
            OpCode::BrtrueS => OpCode::Brtrue,
            OpCode::BeqS => OpCode::Beq,
            OpCode::BgeS => OpCode::Bge,
            OpCode::BgtS => OpCode::Bgt,
            OpCode::BleS => OpCode::Ble,
            OpCode::BltS => OpCode::Blt,
            OpCode::BneUnS => OpCode::BneUn,
            OpCode::BgeUnS => OpCode::BgeUn,
            OpCode::BgtUnS => OpCode::BgtUn,
            OpCode::BleUnS => OpCode::BleUn,
            OpCode::BltUnS => OpCode::BltUn,
            OpCode::LeaveS => OpCode::Leave,
            other => other,
        }
    }

    /// Returns the operand index implied by a macro opcode (`ldloc.2` -> 2, `ldarg.0` -> 0).
    #[must_use]
    pub const fn implicit_index(self) -> Option<u16> {
        match self {
            OpCode::Ldarg0 | OpCode::Ldloc0 | OpCode::Stloc0 => Some(0),
            OpCode::Ldarg1 | OpCode::Ldloc1 | OpCode::Stloc1 => Some(1),
            OpCode::Ldarg2 | OpCode::Ldloc2 | OpCode::Stloc2 => Some(2),
            OpCode::Ldarg3 | OpCode::Ldloc3 | OpCode::Stloc3 => Some(3),
            _ => None,
        }
    }

    /// Returns the constant implied by an `ldc.i4.<n>` macro opcode.
    #[must_use]
    pub const fn implicit_constant(self) -> Option<i32> {
        match self {
            OpCode::LdcI4M1 => Some(-1),
            OpCode::LdcI40 => Some(0),
            OpCode::LdcI41 => Some(1),
            OpCode::LdcI42 => Some(2),
            OpCode::LdcI43 => Some(3),
            OpCode::LdcI44 => Some(4),
            OpCode::LdcI45 => Some(5),
            OpCode::LdcI46 => Some(6),
            OpCode::LdcI47 => Some(7),
            OpCode::LdcI48 => Some(8),
            _ => None,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.mnemonic())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mnemonic = String::deserialize(deserializer)?;
        mnemonic.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn mnemonics_round_trip_through_from_str() {
        for op in OpCode::iter() {
            let parsed: OpCode = op.mnemonic().parse().unwrap();
            assert_eq!(parsed, op, "mnemonic {}", op.mnemonic());
        }
    }

    #[test]
    fn values_and_mnemonics_are_unique() {
        let values: HashSet<u16> = OpCode::iter().map(OpCode::value).collect();
        let mnemonics: HashSet<&str> = OpCode::iter().map(OpCode::mnemonic).collect();
        assert_eq!(values.len(), OpCode::COUNT);
        assert_eq!(mnemonics.len(), OpCode::COUNT);
    }

    #[test]
    fn unknown_mnemonic_is_an_input_error() {
        assert!(matches!(
            "ldfoo".parse::<OpCode>(),
            Err(crate::Error::Input(_))
        ));
    }

    #[test]
    fn two_byte_opcodes() {
        assert_eq!(OpCode::Ceq.size(), 2);
        assert_eq!(OpCode::Ceq.value(), 0xFE01);
        assert_eq!(OpCode::Ret.size(), 1);
    }

    #[test]
    fn short_forms_keep_their_stack_behaviour() {
        for op in OpCode::iter() {
            let long = op.long_form();
            if long != op {
                assert_eq!(op.pop_behavior(), long.pop_behavior(), "{op}");
                assert_eq!(op.push_behavior(), long.push_behavior(), "{op}");
                assert_eq!(op.flow_type(), long.flow_type(), "{op}");
            }
        }
    }

    #[test]
    fn variable_arity_is_limited_to_calls() {
        for op in OpCode::iter() {
            if op.pop_behavior() == StackBehavior::Varpop {
                assert!(op.is_call() || matches!(op, OpCode::Newobj | OpCode::Ret), "{op}");
            }
            if op.push_behavior() == StackBehavior::Varpush {
                assert!(op.is_call(), "{op}");
            }
        }
    }

    #[test]
    fn serde_uses_mnemonics() {
        let json = serde_json::to_string(&OpCode::LdlocS).unwrap();
        assert_eq!(json, "\"ldloc.s\"");
        let op: OpCode = serde_json::from_str("\"callvirt\"").unwrap();
        assert_eq!(op, OpCode::Callvirt);
    }
}
