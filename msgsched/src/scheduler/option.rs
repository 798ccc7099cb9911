/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Placement option descriptors.
//!
//! | Form | Example |
//! |---|---|
//! | whole messages | `Message_1, Message_3` |
//! | one sub-message | `Message_2 sub-msg 1` |
//! | several sub-messages | `Message_2 sub-msgs 1, 3` |
//!
//! Sub-message ordinals are 1-based.  Parsing never fails hard: anything that
//! does not match one of the forms is simply not an option.

use std::fmt;
use std::str::FromStr;

const SUB_SINGLE: &str = " sub-msg ";
const SUB_PLURAL: &str = " sub-msgs ";
const SEPARATOR: &str = ", ";

/// One placement target: a set of whole messages, or a set of sub-messages
/// under one parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOption {
    Messages(Vec<String>),
    SubMessages { parent: String, ordinals: Vec<usize> },
}

impl fmt::Display for SlotOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotOption::Messages(names) => write!(f, "{}", names.join(SEPARATOR)),
            SlotOption::SubMessages { parent, ordinals } => {
                let list = ordinals
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(SEPARATOR);
                let label = if ordinals.len() == 1 {
                    SUB_SINGLE
                } else {
                    SUB_PLURAL
                };
                write!(f, "{parent}{label}{list}")
            }
        }
    }
}

/// The descriptor is not a recognisable option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotAnOption;

impl fmt::Display for NotAnOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a placement option")
    }
}

impl std::error::Error for NotAnOption {}

impl FromStr for SlotOption {
    type Err = NotAnOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(NotAnOption);
        }

        let sub = s
            .split_once(SUB_PLURAL)
            .or_else(|| s.split_once(SUB_SINGLE));

        match sub {
            Some((parent, list)) => {
                let ordinals = list
                    .split(',')
                    .map(|n| n.trim().parse::<usize>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| NotAnOption)?;
                if parent.is_empty() || ordinals.iter().any(|&n| n == 0) {
                    return Err(NotAnOption);
                }
                Ok(SlotOption::SubMessages {
                    parent: parent.to_string(),
                    ordinals,
                })
            }
            None => {
                let names: Vec<String> = s.split(SEPARATOR).map(str::to_string).collect();
                if names.iter().any(|n| n.trim().is_empty()) {
                    return Err(NotAnOption);
                }
                Ok(SlotOption::Messages(names))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_whole_messages() {
        let opt = SlotOption::Messages(vec!["Message_1".into(), "Message_3".into()]);
        assert_eq!(opt.to_string(), "Message_1, Message_3");
    }

    #[test]
    fn display_sub_messages_singular_and_plural() {
        let one = SlotOption::SubMessages {
            parent: "Message_2".into(),
            ordinals: vec![2],
        };
        assert_eq!(one.to_string(), "Message_2 sub-msg 2");

        let many = SlotOption::SubMessages {
            parent: "Message_2".into(),
            ordinals: vec![1, 3],
        };
        assert_eq!(many.to_string(), "Message_2 sub-msgs 1, 3");
    }

    #[test]
    fn parse_accepts_every_displayed_form() {
        for text in ["Time Slot_4", "Message_1, Message_3", "Message_2 sub-msgs 2, 4"] {
            let parsed: SlotOption = text.parse().unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn parse_rejects_malformed_descriptors() {
        assert!("".parse::<SlotOption>().is_err());
        assert!("Message_1 sub-msg x".parse::<SlotOption>().is_err());
        assert!("Message_1 sub-msgs 0, 2".parse::<SlotOption>().is_err());
        assert!("Message_1, , Message_2".parse::<SlotOption>().is_err());
    }
}
