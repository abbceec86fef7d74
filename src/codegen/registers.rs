use std::fmt;

use anyhow::{bail, Result};
use log::trace;

use crate::error::CodeGenError;

pub const MIN_REGISTER: u8 = 0;
pub const MAX_REGISTER: u8 = 15;

const REGISTER_COUNT: usize = (MAX_REGISTER - MIN_REGISTER) as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register(pub u8);

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Occupancy of the general-purpose registers for one compilation.
#[derive(Debug, Default)]
pub struct RegisterFile {
    busy: [bool; REGISTER_COUNT],
}

impl RegisterFile {
    pub fn new() -> RegisterFile {
        RegisterFile::default()
    }

    /// Lowest free register, for temporaries.
    pub fn reserve(&mut self) -> Result<Register> {
        let slot = self.busy.iter().position(|b| !b);
        self.take(slot)
    }

    /// Highest free register, for variables.
    pub fn reserve_high(&mut self) -> Result<Register> {
        let slot = self.busy.iter().rposition(|b| !b);
        self.take(slot)
    }

    fn take(&mut self, slot: Option<usize>) -> Result<Register> {
        let Some(slot) = slot else {
            bail!(CodeGenError::RegistersExhausted {
                min: MIN_REGISTER,
                max: MAX_REGISTER,
            });
        };
        self.busy[slot] = true;
        let register = Register(MIN_REGISTER + slot as u8);
        trace!("reserved {}", register);
        Ok(register)
    }

    pub fn free(&mut self, register: Register) -> Result<()> {
        let slot = register.0.wrapping_sub(MIN_REGISTER) as usize;
        match self.busy.get_mut(slot) {
            Some(busy) if *busy => {
                *busy = false;
                trace!("freed {}", register);
                Ok(())
            }
            _ => bail!(CodeGenError::RegisterAlreadyFree {
                register: register.0
            }),
        }
    }

    pub fn in_use(&self) -> usize {
        self.busy.iter().filter(|b| **b).count()
    }
}
