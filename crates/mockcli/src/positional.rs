//! Positional activation.
//!
//! [`activate_positional`] takes up to three loosely ordered parameters and
//! works out which is the argument list, which the substitutes and which the
//! completion callback:
//!
//! - two parameters with a callback second: the callback, plus the first as
//!   substitutes if it is substitutes, otherwise as the argument list;
//! - one callback: the callback only;
//! - one set of substitutes: the substitutes only;
//! - anything else is read as `(args, substitutes, on_complete)`.
//!
//! [`Param::Null`] fills a position without setting it.

use std::fmt;

use crate::error::CaptureError;
use crate::result::CaptureResult;
use crate::session::{activate, Callback, Session, Substitutes};
use crate::termination::Failure;

/// One positional activation parameter.
pub enum Param {
    Null,
    Args(Vec<String>),
    Substitutes(Substitutes),
    OnComplete(Callback),
}

impl Param {
    pub fn on_complete<F>(callback: F) -> Self
    where
        F: FnOnce(Option<Failure>, CaptureResult) + Send + 'static,
    {
        Param::OnComplete(Box::new(callback))
    }

    fn kind(&self) -> &'static str {
        match self {
            Param::Null => "null",
            Param::Args(_) => "argument list",
            Param::Substitutes(_) => "substitutes",
            Param::OnComplete(_) => "callback",
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Null => f.write_str("Null"),
            Param::Args(args) => f.debug_tuple("Args").field(args).finish(),
            Param::Substitutes(subs) => f.debug_tuple("Substitutes").field(subs).finish(),
            Param::OnComplete(_) => f.write_str("OnComplete(..)"),
        }
    }
}

impl From<Vec<String>> for Param {
    fn from(args: Vec<String>) -> Self {
        Param::Args(args)
    }
}

impl From<Vec<&str>> for Param {
    fn from(args: Vec<&str>) -> Self {
        Param::Args(args.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Param {
    fn from(args: [&str; N]) -> Self {
        Param::Args(args.into_iter().map(String::from).collect())
    }
}

impl From<Substitutes> for Param {
    fn from(substitutes: Substitutes) -> Self {
        Param::Substitutes(substitutes)
    }
}

impl From<Callback> for Param {
    fn from(callback: Callback) -> Self {
        Param::OnComplete(callback)
    }
}

impl From<()> for Param {
    fn from(_: ()) -> Self {
        Param::Null
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Param::Null, Into::into)
    }
}

/// Parameters sorted into their roles.
#[derive(Default)]
pub(crate) struct Resolved {
    pub(crate) args: Option<Vec<String>>,
    pub(crate) substitutes: Option<Substitutes>,
    pub(crate) on_complete: Option<Callback>,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("args", &self.args)
            .field("substitutes", &self.substitutes)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

pub(crate) fn resolve(params: Vec<Param>) -> Result<Resolved, CaptureError> {
    if params.len() > 3 {
        return Err(CaptureError::InvalidParameters(format!(
            "expected at most 3 parameters, got {}",
            params.len()
        )));
    }

    let mut params = params.into_iter();
    let shape = (params.next(), params.next(), params.next());
    match shape {
        (Some(first), Some(Param::OnComplete(callback)), None) => {
            let mut resolved = Resolved {
                on_complete: Some(callback),
                ..Resolved::default()
            };
            match first {
                Param::Null => {}
                Param::Args(args) => resolved.args = Some(args),
                Param::Substitutes(subs) => resolved.substitutes = Some(subs),
                Param::OnComplete(_) => return Err(misplaced(0, "callback")),
            }
            Ok(resolved)
        }
        (Some(Param::OnComplete(callback)), None, None) => Ok(Resolved {
            on_complete: Some(callback),
            ..Resolved::default()
        }),
        (Some(Param::Substitutes(subs)), None, None) => Ok(Resolved {
            substitutes: Some(subs),
            ..Resolved::default()
        }),
        (first, second, third) => {
            let mut resolved = Resolved::default();
            match first {
                None | Some(Param::Null) => {}
                Some(Param::Args(args)) => resolved.args = Some(args),
                Some(other) => return Err(misplaced(0, other.kind())),
            }
            match second {
                None | Some(Param::Null) => {}
                Some(Param::Substitutes(subs)) => resolved.substitutes = Some(subs),
                Some(other) => return Err(misplaced(1, other.kind())),
            }
            match third {
                None | Some(Param::Null) => {}
                Some(Param::OnComplete(callback)) => resolved.on_complete = Some(callback),
                Some(other) => return Err(misplaced(2, other.kind())),
            }
            Ok(resolved)
        }
    }
}

fn misplaced(position: usize, kind: &str) -> CaptureError {
    let expected = ["argument list", "substitutes", "callback"][position];
    CaptureError::InvalidParameters(format!(
        "parameter {} must be {} or null, got {}",
        position + 1,
        expected,
        kind
    ))
}

/// Activate from loosely ordered parameters.
///
/// Invalid shapes fail before anything is swapped.
pub fn activate_positional(params: Vec<Param>) -> Result<Session, CaptureError> {
    let Resolved {
        args,
        substitutes,
        on_complete,
    } = resolve(params)?;
    activate(args, substitutes, on_complete)
}

/// Activate a capture session from up to three positional parameters.
///
/// ```rust,no_run
/// use mockcli::{mock_cli, Param};
///
/// let session = mock_cli!(
///     vec!["node", "script", "--flag"],
///     Param::on_complete(|error, result| {
///         assert!(error.is_none());
///         println!("exited with {}", result.code);
///     })
/// )
/// .expect("no other capture running");
/// # drop(session);
/// ```
#[macro_export]
macro_rules! mock_cli {
    () => {
        $crate::activate_positional(::std::vec::Vec::new())
    };
    ($($param:expr),+ $(,)?) => {
        $crate::activate_positional(::std::vec![$($crate::Param::from($param)),+])
    };
}
