//! `Session`: the inputs and global variables a program runs against.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::buffer::InputBuffer;
use crate::code::Program;
use crate::error::VoreError;
use crate::eval::Value;
use crate::exec_context::ExecutionContext;
use crate::interpreter::{self, Report};
use crate::output::write_sibling;
use crate::pattern::MatchConfig;

/// One piece of text a program runs over.
#[derive(Debug, Clone)]
pub struct Input {
    name: String,
    path: Option<PathBuf>,
    buffer: InputBuffer,
    dirty: bool,
}

impl Input {
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        Self {
            name: name.into(),
            path: None,
            buffer: InputBuffer::from_str(text),
            dirty: false,
        }
    }

    /// Read a whole file into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VoreError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| VoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("opened {} ({} bytes)", path.display(), bytes.len());
        Ok(Self {
            name: path.display().to_string(),
            path: Some(path.to_path_buf()),
            buffer: InputBuffer::from_bytes(bytes),
            dirty: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file this input was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current contents, including replacements made so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.to_bytes()
    }

    /// True if a replacement changed this input since it was last written.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn buffer(&self) -> &InputBuffer {
        &self.buffer
    }

    pub(crate) fn replace_contents(&mut self, bytes: Vec<u8>) {
        self.buffer = self.buffer.with_contents(bytes);
        self.dirty = true;
    }
}

/// Inputs, global variables and limits shared by every statement of a run.
///
/// Globals persist across calls to [`Session::execute`], so a session can run
/// several programs in turn.
#[derive(Debug, Default)]
pub struct Session {
    pub(crate) config: MatchConfig,
    pub(crate) inputs: Vec<Input>,
    pub(crate) globals: HashMap<String, Value>,
    written: Vec<PathBuf>,
}

impl Session {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn add_text(&mut self, name: impl Into<String>, text: &str) {
        self.inputs.push(Input::from_text(name, text));
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), VoreError> {
        self.inputs.push(Input::open(path)?);
        Ok(())
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// Contents of the input called `name`, decoded lossily.
    pub fn text(&self, name: &str) -> Option<String> {
        self.inputs
            .iter()
            .find(|input| input.name == name)
            .map(|input| String::from_utf8_lossy(&input.contents()).into_owned())
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Files written by replacements so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Run `program` over the current inputs.
    ///
    /// Returns one report per (input, find/replace statement) pair, in
    /// execution order. Replaced file inputs are written out before this
    /// returns.
    pub fn execute(&mut self, program: &Program) -> Result<Vec<Report>, VoreError> {
        let mut ctx = ExecutionContext::new(self, &program.arena);
        interpreter::execute(&mut ctx, program)
    }

    /// Write every changed file input to its `.vore` sibling.
    pub fn flush(&mut self) -> Result<(), VoreError> {
        for input in self.inputs.iter_mut().filter(|input| input.dirty) {
            let Some(path) = &input.path else {
                continue;
            };
            let target = write_sibling(path, &input.buffer.to_bytes())?;
            info!("{} written to {}", input.name, target.display());
            input.dirty = false;
            self.written.push(target);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_add_text_and_read_back() {
        let mut session = Session::default();
        session.add_text("greeting", "hello");
        assert_eq!(session.text("greeting").as_deref(), Some("hello"));
        assert_eq!(session.text("other"), None);
        assert!(!session.inputs()[0].is_dirty());
    }

    #[test]
    fn test_add_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        fs::write(&path, b"bytes \xff here").unwrap();

        let mut session = Session::default();
        session.add_file(&path).unwrap();

        let input = &session.inputs()[0];
        assert_eq!(input.path(), Some(path.as_path()));
        assert_eq!(input.contents(), b"bytes \xff here");
    }

    #[test]
    fn test_add_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::default();
        let err = session.add_file(dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, VoreError::Open { .. }));
        assert!(session.inputs().is_empty());
    }

    #[test]
    fn test_flush_skips_text_inputs() {
        let mut session = Session::default();
        session.add_text("t", "abc");
        session.inputs[0].replace_contents(b"xyz".to_vec());
        session.flush().unwrap();
        assert!(session.written().is_empty());
        assert_eq!(session.text("t").as_deref(), Some("xyz"));
    }

    #[test]
    fn test_flush_writes_dirty_files_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "abc").unwrap();

        let mut session = Session::default();
        session.add_file(&path).unwrap();
        session.inputs[0].replace_contents(b"xyz".to_vec());
        session.flush().unwrap();
        session.flush().unwrap();

        let expected = dir.path().join("f.vore.txt");
        assert_eq!(session.written(), &[expected.clone()]);
        assert_eq!(fs::read(&expected).unwrap(), b"xyz");
    }
}
