//! Response channel back to the privileged caller.

use std::io::Write;

use anyhow::{Context, Result};

use crate::core::messages::Reply;

pub trait Responder {
    fn reply(&mut self, reply: &Reply) -> Result<()>;
}

/// Writes each reply as one JSON line and flushes immediately.
#[derive(Debug)]
pub struct JsonlResponder<W: Write> {
    writer: W,
}

impl<W: Write> JsonlResponder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Responder for JsonlResponder<W> {
    fn reply(&mut self, reply: &Reply) -> Result<()> {
        let mut line = serde_json::to_string(reply).context("serialize reply")?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .context("write reply")?;
        self.writer.flush().context("flush reply")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_line_per_reply() {
        let mut responder = JsonlResponder::new(Vec::new());
        responder.reply(&Reply::ack()).expect("ack");
        responder.reply(&Reply::busy()).expect("busy");
        let out = String::from_utf8(responder.into_inner()).expect("utf8");
        let kinds: Vec<String> = out
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).expect("json");
                value["kind"].as_str().expect("kind").to_string()
            })
            .collect();
        assert_eq!(kinds, vec!["ack", "busy"]);
    }
}
