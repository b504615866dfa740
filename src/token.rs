use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub(crate) struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored token, or `None` if no usable token is stored.
    pub(crate) fn load(&self) -> io::Result<Option<String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let token = contents.lines().next().map(str::trim).unwrap_or_default();
        if token.is_empty() {
            debug!("Token file {} is empty", self.path.display());
            return Ok(None);
        }

        Ok(Some(token.to_string()))
    }

    pub(crate) fn save(&self, token: &str) -> io::Result<()> {
        fs::write(&self.path, token)?;
        info!("Stored bot token in {}", self.path.display());
        Ok(())
    }

    pub(crate) fn remove(&self) -> io::Result<()> {
        match fs::remove_file(self.path()) {
            Ok(()) => {
                info!("Removed token file {}", self.path().display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Returns the stored token, asking on `output` and storing the answer
    /// when there is none.
    pub(crate) fn load_or_prompt<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
    ) -> io::Result<String> {
        if let Some(token) = self.load()? {
            return Ok(token);
        }

        let token = prompt_token(input, output)?;
        self.save(&token)?;
        Ok(token)
    }
}

pub(crate) fn prompt_token<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<String> {
    writeln!(output, "What is the bot token?")?;
    write!(output, "Token: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    let token = line.trim();
    if token.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no bot token was entered",
        ));
    }

    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("suitebot-{}-{}", std::process::id(), name));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn saved_token_reads_back_identically() {
        let store = TokenStore::new(scratch_file("round-trip"));

        store.save("NzkyNzE1NDU0MTk2MDg4ODQy.X-hvzA.Ovy4MCQywSkoMRRclStW4xAYK7I").unwrap();

        // a fresh store over the same file simulates a restart
        let reopened = TokenStore::new(store.path());
        assert_eq!(
            reopened.load().unwrap().as_deref(),
            Some("NzkyNzE1NDU0MTk2MDg4ODQy.X-hvzA.Ovy4MCQywSkoMRRclStW4xAYK7I")
        );

        store.remove().unwrap();
    }

    #[test]
    fn only_first_line_is_used() {
        let path = scratch_file("first-line");
        fs::write(&path, "abc.def\nleftover\n").unwrap();

        let store = TokenStore::new(&path);
        assert_eq!(store.load().unwrap().as_deref(), Some("abc.def"));

        store.remove().unwrap();
    }

    #[test]
    fn prompts_and_stores_when_nothing_is_stored() {
        let store = TokenStore::new(scratch_file("prompted"));
        let mut input = Cursor::new("typed-token\n");
        let mut output = Vec::new();

        let token = store.load_or_prompt(&mut input, &mut output).unwrap();

        assert_eq!(token, "typed-token");
        assert_eq!(store.load().unwrap().as_deref(), Some("typed-token"));

        // nothing is asked once a token is stored
        let mut output = Vec::new();
        let again = store.load_or_prompt(&mut Cursor::new(""), &mut output).unwrap();
        assert_eq!(again, "typed-token");
        assert!(output.is_empty());

        store.remove().unwrap();
    }

    #[test]
    fn missing_or_empty_file_has_no_token() {
        let store = TokenStore::new(scratch_file("missing"));
        assert_eq!(store.load().unwrap(), None);

        fs::write(store.path(), "\n").unwrap();
        assert_eq!(store.load().unwrap(), None);

        store.remove().unwrap();
    }

    #[test]
    fn removing_a_missing_file_is_fine() {
        let store = TokenStore::new(scratch_file("never-written"));

        assert!(store.remove().is_ok());
    }

    #[test]
    fn prompt_reads_one_trimmed_line() {
        let mut input = Cursor::new("  secret-token  \nignored\n");
        let mut output = Vec::new();

        let token = prompt_token(&mut input, &mut output).unwrap();

        assert_eq!(token, "secret-token");
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "What is the bot token?\nToken: "
        );
    }

    #[test]
    fn prompt_rejects_empty_answer() {
        let mut input = Cursor::new("\n");
        let mut output = Vec::new();

        let err = prompt_token(&mut input, &mut output).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
