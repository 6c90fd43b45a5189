use std::env;
use std::error;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("couldn't parse the value of {0:?} environment variable as UTF-8 string")]
    NotUtf8(String),

    #[error("couldn't parse the value of {0:?} environment variable: {1}")]
    ParsingFailed(String, #[source] Box<dyn error::Error + Send + Sync>),
}

pub fn parse_env_var<T: FromStr>(name: &str) -> Result<Option<T>, Error>
where
    T::Err: error::Error + Send + Sync + 'static,
{
    if let Some(value) = env::var_os(name) {
        Ok(Some(
            value
                .into_string()
                .map_err(|_| Error::NotUtf8(name.to_string()))?
                .parse()
                .map_err(|err| Error::ParsingFailed(name.to_string(), Box::new(err)))?,
        ))
    } else {
        Ok(None)
    }
}

/// Reads a platform path list (`:`-separated on Unix, `;` on Windows).
pub fn parse_env_paths(name: &str) -> Option<Vec<PathBuf>> {
    let value = env::var_os(name)?;
    let paths: Vec<PathBuf> = env::split_paths(&value)
        .filter(|path| !path.as_os_str().is_empty())
        .collect();
    if paths.is_empty() {
        None
    } else {
        Some(paths)
    }
}
