use hashbrown::HashSet;

use super::{Skeleton, SkeletonNode};
use crate::error::ParseError;
use crate::node::NodeId;

/// Parses tree text into a [`Skeleton`]. No partial result on error.
pub fn decode(text: &str) -> Result<Skeleton, ParseError> {
    check_balance(text)?;

    let mut parser = Parser {
        text,
        pos: 0,
        seen: HashSet::new(),
    };
    let roots = parser.parse_trunk()?;

    tracing::trace!(roots = roots.len(), "Decoded tree text");
    Ok(Skeleton { roots })
}

/// Reports the first `)` without a match, or the innermost unclosed `(`.
fn check_balance(text: &str) -> Result<(), ParseError> {
    let mut open = Vec::new();
    for (position, byte) in text.bytes().enumerate() {
        match byte {
            b'(' => open.push(position),
            b')' => {
                if open.pop().is_none() {
                    return Err(ParseError::UnbalancedParentheses { position });
                }
            }
            _ => {}
        }
    }
    match open.last() {
        Some(&position) => Err(ParseError::UnbalancedParentheses { position }),
        None => Ok(()),
    }
}

fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b'(' | b')' | b',' | b':' | b';') || byte.is_ascii_whitespace()
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    seen: HashSet<NodeId>,
}

impl<'a> Parser<'a> {
    /// Next non-whitespace byte, without consuming it.
    fn peek(&mut self) -> Option<u8> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        bytes.get(self.pos).copied()
    }

    fn unexpected(&self) -> ParseError {
        match self.text[self.pos..].chars().next() {
            Some(found) => ParseError::UnexpectedCharacter {
                position: self.pos,
                found,
            },
            None => ParseError::UnexpectedEnd,
        }
    }

    fn take_token(&mut self) -> &'a str {
        let start = self.pos;
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() && !is_delimiter(bytes[self.pos]) {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    fn parse_trunk(&mut self) -> Result<Vec<SkeletonNode>, ParseError> {
        if self.peek() != Some(b'(') {
            return Err(self.unexpected());
        }
        self.pos += 1;

        let roots = if self.peek() == Some(b')') {
            self.pos += 1;
            Vec::new()
        } else {
            self.parse_group()?
        };

        match self.peek() {
            Some(b';') => self.pos += 1,
            None => return Err(ParseError::MissingTerminator { position: self.pos }),
            Some(_) => return Err(self.unexpected()),
        }

        if self.peek().is_some() {
            return Err(ParseError::TrailingInput { position: self.pos });
        }
        Ok(roots)
    }

    /// Comma separated items of the group whose `(` was just consumed, up to
    /// and including its closing `)`.
    ///
    /// Nested branches are kept on an explicit stack of open groups, so the
    /// nesting depth is bounded by memory only.
    fn parse_group(&mut self) -> Result<Vec<SkeletonNode>, ParseError> {
        // (position of the branch's '(', items of the enclosing group)
        let mut open_groups: Vec<(usize, Vec<SkeletonNode>)> = Vec::new();
        let mut items = Vec::new();

        loop {
            match self.peek() {
                Some(b'(') => {
                    let open = self.pos;
                    self.pos += 1;
                    if self.peek() == Some(b')') {
                        return Err(ParseError::EmptyBranch { position: open });
                    }
                    open_groups.push((open, std::mem::take(&mut items)));
                    continue;
                }
                Some(_) => {
                    let (id, delta) = self.parse_label()?;
                    items.push(SkeletonNode {
                        id,
                        delta,
                        children: None,
                    });
                }
                None => return Err(ParseError::UnexpectedEnd),
            }

            // After an item: either another sibling or the end of one or
            // more groups.
            loop {
                match self.peek() {
                    Some(b',') => {
                        self.pos += 1;
                        break;
                    }
                    Some(b')') => {
                        self.pos += 1;
                        let Some((open, enclosing)) = open_groups.pop() else {
                            return Ok(items);
                        };
                        let children = std::mem::replace(&mut items, enclosing);
                        if children.len() < 2 {
                            return Err(ParseError::SingleChildBranch { position: open });
                        }
                        let (id, delta) = self.parse_label()?;
                        items.push(SkeletonNode {
                            id,
                            delta,
                            children: Some(children),
                        });
                    }
                    _ => return Err(self.unexpected()),
                }
            }
        }
    }

    /// `id:delta`
    fn parse_label(&mut self) -> Result<(NodeId, f32), ParseError> {
        self.peek();
        let start = self.pos;
        let token = self.take_token();
        if token.is_empty() {
            return Err(self.unexpected());
        }
        let id = token
            .parse::<u32>()
            .ok()
            .and_then(NodeId::from_raw)
            .ok_or_else(|| ParseError::InvalidLabel {
                position: start,
                found: token.to_string(),
            })?;
        if !self.seen.insert(id) {
            return Err(ParseError::DuplicateLabel {
                position: start,
                id,
            });
        }

        if self.peek() != Some(b':') {
            return Err(ParseError::MissingDelta { position: self.pos });
        }
        self.pos += 1;

        self.peek();
        let start = self.pos;
        let token = self.take_token();
        if token.is_empty() {
            return Err(ParseError::MissingDelta { position: start });
        }
        let delta = token
            .parse::<f32>()
            .map_err(|_| ParseError::InvalidDelta {
                position: start,
                found: token.to_string(),
            })?;

        Ok((id, delta))
    }
}
