use std::io::Write;

use anyhow::{bail, Result};

use crate::{
    codegen::instr::{DeviceTarget, Instruction},
    error::CodeGenError,
};

pub trait Emit {
    fn emit(&self, f: &mut dyn Write) -> Result<()>;
}

impl Emit for [Instruction] {
    fn emit(&self, f: &mut dyn Write) -> Result<()> {
        for instr in self {
            instr.emit(f)?;
        }

        Ok(())
    }
}

impl Emit for Instruction {
    fn emit(&self, f: &mut dyn Write) -> Result<()> {
        match self {
            Instruction::Label(name) => writeln!(f, "{}:", name)?,
            Instruction::Move { dst, src } => writeln!(f, "move {} {}", dst, src)?,
            Instruction::Arithmetic { op, dst, lhs, rhs } => {
                writeln!(f, "{} {} {} {}", op.mnemonic(), dst, lhs, rhs)?
            }
            Instruction::Set {
                condition,
                dst,
                lhs,
                rhs,
            } => writeln!(f, "{} {} {} {}", condition.set_mnemonic(), dst, lhs, rhs)?,
            Instruction::Bitwise { op, dst, lhs, rhs } => {
                writeln!(f, "{} {} {} {}", op.mnemonic(), dst, lhs, rhs)?
            }
            Instruction::Select {
                dst,
                condition,
                then_value,
                else_value,
            } => writeln!(f, "select {} {} {} {}", dst, condition, then_value, else_value)?,
            Instruction::Jump(target) => writeln!(f, "j {}", target)?,
            Instruction::Branch {
                condition,
                lhs,
                rhs,
                target,
            } => writeln!(
                f,
                "{} {} {} {}",
                condition.branch_mnemonic(),
                lhs,
                rhs,
                target
            )?,
            Instruction::BranchRelative {
                condition,
                lhs,
                rhs,
                offset,
            } => writeln!(
                f,
                "{} {} {} {}",
                condition.relative_mnemonic(),
                lhs,
                rhs,
                offset
            )?,
            Instruction::Load {
                dst,
                device,
                slot,
                property,
            } => match (device, slot) {
                (DeviceTarget::Port(port), None) => writeln!(f, "l {} {} {}", dst, port, property)?,
                (DeviceTarget::Port(port), Some(slot)) => {
                    writeln!(f, "ls {} {} {} {}", dst, port, slot, property)?
                }
                (DeviceTarget::Batch { type_hash, mode }, None) => writeln!(
                    f,
                    "lb {} {} {} {}",
                    dst,
                    type_hash,
                    property,
                    mode.as_str()
                )?,
                (DeviceTarget::Batch { type_hash, mode }, Some(slot)) => writeln!(
                    f,
                    "lbs {} {} {} {} {}",
                    dst,
                    type_hash,
                    slot,
                    property,
                    mode.as_str()
                )?,
                (
                    DeviceTarget::NamedBatch {
                        type_hash,
                        name_hash,
                        mode,
                    },
                    None,
                ) => writeln!(
                    f,
                    "lbn {} {} {} {} {}",
                    dst,
                    type_hash,
                    name_hash,
                    property,
                    mode.as_str()
                )?,
                (
                    DeviceTarget::NamedBatch {
                        type_hash,
                        name_hash,
                        mode,
                    },
                    Some(slot),
                ) => writeln!(
                    f,
                    "lbns {} {} {} {} {} {}",
                    dst,
                    type_hash,
                    name_hash,
                    slot,
                    property,
                    mode.as_str()
                )?,
            },
            Instruction::Store {
                device,
                slot,
                property,
                value,
            } => match (device, slot) {
                (DeviceTarget::Port(port), None) => {
                    writeln!(f, "s {} {} {}", port, property, value)?
                }
                (DeviceTarget::Port(port), Some(slot)) => {
                    writeln!(f, "ss {} {} {} {}", port, slot, property, value)?
                }
                // Batch stores write every device, so the mode is dropped.
                (DeviceTarget::Batch { type_hash, .. }, None) => {
                    writeln!(f, "sb {} {} {}", type_hash, property, value)?
                }
                (DeviceTarget::Batch { type_hash, .. }, Some(slot)) => {
                    writeln!(f, "sbs {} {} {} {}", type_hash, slot, property, value)?
                }
                (
                    DeviceTarget::NamedBatch {
                        type_hash,
                        name_hash,
                        ..
                    },
                    None,
                ) => writeln!(f, "sbn {} {} {} {}", type_hash, name_hash, property, value)?,
                (DeviceTarget::NamedBatch { name_hash, .. }, Some(_)) => {
                    bail!(CodeGenError::UnsupportedDeviceStore {
                        name: name_hash.to_string(),
                    })
                }
            },
            Instruction::Sleep(duration) => writeln!(f, "sleep {}", duration)?,
            Instruction::Yield => writeln!(f, "yield")?,
            Instruction::Hcf => writeln!(f, "hcf")?,
            Instruction::Function { name, dst, args } => {
                write!(f, "{} {}", name, dst)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                writeln!(f)?
            }
        }

        Ok(())
    }
}

/// Renders the program as newline-terminated text.
pub fn emit_to_string(instructions: &[Instruction]) -> Result<String> {
    let mut out = Vec::new();
    instructions.emit(&mut out)?;
    Ok(String::from_utf8(out)?)
}
