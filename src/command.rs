use crate::error::{Error, Result};
use crate::negator::KeyNegator;
use crate::observer::ChangeObserver;
use crate::selector::TopKSelector;

/// One line of selector input.
///
/// ```text
/// # comment
/// alice 12.5          upsert
/// add bob 3           upsert
/// del alice           delete
/// add del 1           upsert of an element named `del`
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Upsert { element: String, key: f64 },
    Delete { element: String },
}

impl Command {
    /// Parses a single line. Blank lines and `#` comments yield `None`.
    ///
    /// A two-token line starting with `del` or `delete` is always a deletion,
    /// so `del 5` deletes element `5`. Elements named `del` or `delete` are
    /// upserted with the `add` form: `add del 5`.
    pub fn parse(line_no: usize, line: &str) -> Result<Option<Command>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let command = match tokens.as_slice() {
            ["add", element, key] => Command::Upsert {
                element: element.to_string(),
                key: parse_key(line_no, key)?,
            },
            ["del" | "delete", element] => Command::Delete {
                element: element.to_string(),
            },
            [element, key] => Command::Upsert {
                element: element.to_string(),
                key: parse_key(line_no, key)?,
            },
            _ => {
                return Err(Error::Parse {
                    line: line_no,
                    reason: "expected `<element> <key>`, `add <element> <key>` or `del <element>`"
                        .to_string(),
                })
            }
        };
        Ok(Some(command))
    }

    pub fn apply<O, N>(self, selector: &mut TopKSelector<String, f64, O, N>) -> Result<()>
    where
        O: ChangeObserver<String, f64>,
        N: KeyNegator<f64>,
    {
        match self {
            Command::Upsert { element, key } => selector.add_or_update(element, key),
            Command::Delete { element } => {
                selector.delete(&element);
                Ok(())
            }
        }
    }
}

/// Applies every command in `input` in order. Returns how many were applied.
pub fn apply_all<O, N>(input: &str, selector: &mut TopKSelector<String, f64, O, N>) -> Result<usize>
where
    O: ChangeObserver<String, f64>,
    N: KeyNegator<f64>,
{
    let mut applied = 0;
    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let Some(command) = Command::parse(line_no, line)? else {
            continue;
        };
        command.apply(selector).map_err(|err| match err {
            Error::IncomparableKey => Error::Parse {
                line: line_no,
                reason: err.to_string(),
            },
            other => other,
        })?;
        applied += 1;
    }
    Ok(applied)
}

fn parse_key(line_no: usize, raw: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|_| Error::Parse {
        line: line_no,
        reason: format!("invalid key `{raw}`"),
    })
}
