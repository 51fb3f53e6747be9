use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

/// Some literal Rydesta source: a REPL line, a script on disk, or a loaded
/// module. Essentially a string with a path, the path doubling as the
/// source's name for diagnostics. Sources without a real path point at
/// `./source`.
#[derive(Debug, PartialEq, Eq)]
pub struct Source {
    pub contents: String,
    pub path: PathBuf,
}

impl Source {
    pub fn new(contents: &str, path: &Path) -> Rc<Source> {
        Rc::new(Source {
            contents: contents.to_string(),
            path: path.to_owned(),
        })
    }

    /// Reads a file from disk into a `Source`.
    pub fn path(path: &Path) -> std::io::Result<Rc<Source>> {
        let contents = fs::read_to_string(path)?;
        Ok(Source::new(&contents, path))
    }

    /// Wraps a bare string as a `Source` with no real path.
    pub fn source(contents: &str) -> Rc<Source> {
        Source::new(contents, &PathBuf::from("./source"))
    }
}
