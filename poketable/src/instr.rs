//! Instruction codec.
//!
//! Each instruction is a tag word followed by its operands. Tag values live
//! in a reserved band (`0xF0E0_xxxx`) that no sane MMIO address or mask
//! occupies, so a corrupted or misaligned table fails decode loudly instead
//! of being executed as garbage writes.

/// Tag word for `Poke`.
pub const OP_POKE: u32 = 0xF0E0_0001;
/// Tag word for `Or`.
pub const OP_OR: u32 = 0xF0E0_0002;
/// Tag word for `Update`.
pub const OP_UPDATE: u32 = 0xF0E0_0003;
/// Tag word for `WaitUntil`.
pub const OP_WAIT: u32 = 0xF0E0_0004;
/// Tag word for `End`. Distinct pattern so a raw memory scan can spot
/// table boundaries.
pub const OP_END: u32 = 0xF0E0_FFFF;

/// One poke-table instruction. Immutable once authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Unconditional 32-bit write.
    Poke { addr: u32, val: u32 },
    /// Read, OR in `mask`, write back.
    Or { addr: u32, mask: u32 },
    /// Read, clear `clear` bits, set `set` bits, write back.
    Update { addr: u32, clear: u32, set: u32 },
    /// Busy-read until `*addr & mask == expected`. No timeout.
    WaitUntil { addr: u32, mask: u32, expected: u32 },
    /// Terminator.
    End,
}

impl Instruction {
    /// Encoded size of this instruction in words (tag included).
    pub const fn words(&self) -> usize {
        match self {
            Instruction::Poke { .. } | Instruction::Or { .. } => 3,
            Instruction::Update { .. } | Instruction::WaitUntil { .. } => 4,
            Instruction::End => 1,
        }
    }
}

/// Encoded size in words of the instruction starting with `tag`, or `None`
/// for an unknown tag.
pub const fn words_for(tag: u32) -> Option<usize> {
    match tag {
        OP_POKE | OP_OR => Some(3),
        OP_UPDATE | OP_WAIT => Some(4),
        OP_END => Some(1),
        _ => None,
    }
}

/// Codec errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Word at the cursor is not a known tag.
    BadOpcode(u32),
    /// Slice ended in the middle of an instruction.
    Truncated,
    /// Output buffer too small for the encoded table.
    Overflow,
    /// Ran off the end of the slice without seeing `End`.
    MissingEnd,
}

/// Total encoded size of `table` in words.
pub fn encoded_len(table: &[Instruction]) -> usize {
    table.iter().map(|i| i.words()).sum()
}

/// Encode `table` into `out`, returning the number of words written.
///
/// Inverse of [`InstrReader`] for any table ending in [`Instruction::End`].
pub fn encode_into(table: &[Instruction], out: &mut [u32]) -> Result<usize, CodecError> {
    let mut pos = 0usize;
    for instr in table {
        let need = instr.words();
        if pos + need > out.len() {
            return Err(CodecError::Overflow);
        }
        match *instr {
            Instruction::Poke { addr, val } => {
                out[pos] = OP_POKE;
                out[pos + 1] = addr;
                out[pos + 2] = val;
            }
            Instruction::Or { addr, mask } => {
                out[pos] = OP_OR;
                out[pos + 1] = addr;
                out[pos + 2] = mask;
            }
            Instruction::Update { addr, clear, set } => {
                out[pos] = OP_UPDATE;
                out[pos + 1] = addr;
                out[pos + 2] = clear;
                out[pos + 3] = set;
            }
            Instruction::WaitUntil {
                addr,
                mask,
                expected,
            } => {
                out[pos] = OP_WAIT;
                out[pos + 1] = addr;
                out[pos + 2] = mask;
                out[pos + 3] = expected;
            }
            Instruction::End => {
                out[pos] = OP_END;
            }
        }
        pos += need;
    }
    Ok(pos)
}

/// Zero-allocation decoder: walks a word slice, yielding instructions.
///
/// Yields `None` at a clean end-of-slice; a partial trailing instruction
/// yields `Err(Truncated)`. The reader does not require a trailing `End`;
/// component tables are stored without one (the image assembler writes the
/// group terminators).
pub struct InstrReader<'a> {
    words: &'a [u32],
    pos: usize,
    failed: bool,
}

impl<'a> InstrReader<'a> {
    pub fn new(words: &'a [u32]) -> Self {
        Self {
            words,
            pos: 0,
            failed: false,
        }
    }

    /// Current cursor position in words.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for InstrReader<'a> {
    type Item = Result<Instruction, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.words.len() {
            return None;
        }
        let tag = self.words[self.pos];
        let need = match words_for(tag) {
            Some(n) => n,
            None => {
                self.failed = true;
                return Some(Err(CodecError::BadOpcode(tag)));
            }
        };
        if self.pos + need > self.words.len() {
            self.failed = true;
            return Some(Err(CodecError::Truncated));
        }
        let w = &self.words[self.pos..self.pos + need];
        self.pos += need;
        let instr = match tag {
            OP_POKE => Instruction::Poke {
                addr: w[1],
                val: w[2],
            },
            OP_OR => Instruction::Or {
                addr: w[1],
                mask: w[2],
            },
            OP_UPDATE => Instruction::Update {
                addr: w[1],
                clear: w[2],
                set: w[3],
            },
            OP_WAIT => Instruction::WaitUntil {
                addr: w[1],
                mask: w[2],
                expected: w[3],
            },
            _ => Instruction::End,
        };
        Some(Ok(instr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(table: &[Instruction]) -> Vec<Instruction> {
        let mut buf = [0u32; 256];
        let n = encode_into(table, &mut buf).unwrap();
        assert_eq!(n, encoded_len(table));
        InstrReader::new(&buf[..n])
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_roundtrip_all_opcodes() {
        let table = [
            Instruction::Poke {
                addr: 0x8010_0000,
                val: 0xDEAD_BEEF,
            },
            Instruction::Or {
                addr: 0x8010_0004,
                mask: 0x8000_0000,
            },
            Instruction::Update {
                addr: 0x8010_0008,
                clear: 0x0000_00FF,
                set: 0x0000_0012,
            },
            Instruction::WaitUntil {
                addr: 0x8010_000C,
                mask: 0x1,
                expected: 0x1,
            },
            Instruction::End,
        ];
        assert_eq!(roundtrip(&table), table);
    }

    #[test]
    fn test_empty_table_roundtrip() {
        let table = [Instruction::End];
        assert_eq!(roundtrip(&table), table);
        assert_eq!(encoded_len(&table), 1);
    }

    #[test]
    fn test_word_counts() {
        assert_eq!(Instruction::Poke { addr: 0, val: 0 }.words(), 3);
        assert_eq!(Instruction::Or { addr: 0, mask: 0 }.words(), 3);
        assert_eq!(
            Instruction::Update {
                addr: 0,
                clear: 0,
                set: 0
            }
            .words(),
            4
        );
        assert_eq!(
            Instruction::WaitUntil {
                addr: 0,
                mask: 0,
                expected: 0
            }
            .words(),
            4
        );
        assert_eq!(Instruction::End.words(), 1);
        assert_eq!(words_for(0x1234), None);
    }

    #[test]
    fn test_bad_opcode() {
        let words = [0x8010_0000u32, 0x1, 0x2];
        let mut rd = InstrReader::new(&words);
        assert_eq!(rd.next(), Some(Err(CodecError::BadOpcode(0x8010_0000))));
        // Reader is fused after an error.
        assert_eq!(rd.next(), None);
    }

    #[test]
    fn test_truncated() {
        let words = [OP_UPDATE, 0x8010_0000, 0xFF];
        let mut rd = InstrReader::new(&words);
        assert_eq!(rd.next(), Some(Err(CodecError::Truncated)));
    }

    #[test]
    fn test_encode_overflow() {
        let table = [Instruction::Poke { addr: 0, val: 0 }];
        let mut buf = [0u32; 2];
        assert_eq!(encode_into(&table, &mut buf), Err(CodecError::Overflow));
    }

    fn arb_instruction() -> impl Strategy<Value = Instruction> {
        prop_oneof![
            (any::<u32>(), any::<u32>()).prop_map(|(addr, val)| Instruction::Poke { addr, val }),
            (any::<u32>(), any::<u32>()).prop_map(|(addr, mask)| Instruction::Or { addr, mask }),
            (any::<u32>(), any::<u32>(), any::<u32>())
                .prop_map(|(addr, clear, set)| Instruction::Update { addr, clear, set }),
            (any::<u32>(), any::<u32>(), any::<u32>()).prop_map(|(addr, mask, expected)| {
                Instruction::WaitUntil {
                    addr,
                    mask,
                    expected,
                }
            }),
        ]
    }

    proptest! {
        #[test]
        fn prop_roundtrip(body in proptest::collection::vec(arb_instruction(), 0..32)) {
            let mut table = body;
            table.push(Instruction::End);
            prop_assert_eq!(roundtrip(&table), table);
        }
    }
}
