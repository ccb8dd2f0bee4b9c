
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgError {
    #[error("Invalid boolean flag: {:?}", .0)]
    InvalidBool(String),
    #[error("Flag -{} is missing an argument", .0)]
    MissingArg(String),
    #[error("Unknown flag -{}", .0)]
    UnknownFlag(String),
    #[error("Unexpected argument {:?}", .0)]
    UnexpectedArg(String),
}

/// Parse a boolean flag; true is "-c" or "-c=true", false is "-c=false"
pub fn parse_flag_optional_bool(value: Option<&str>) -> Result<bool, ArgError> {
    match value {
        None => Ok(true),
        Some("false" | "no") => Ok(false),
        Some("true" | "yes") => Ok(true),
        Some(s) => Err(ArgError::InvalidBool(s.into())),
    }
}
/// Parse a required parameter for an option, either inline or as the next arg
pub fn parse_param(
    flag: &str, args: &mut impl Iterator<Item = String>, inline: Option<&str>
) -> Result<String, ArgError> {
    match inline {
        Some(v) => Ok(v.into()),
        None => args.next().ok_or_else(|| ArgError::MissingArg(flag.into())),
    }
}
/// Comma separated list, "a, b,,c" -> ["a", "b", "c"]
pub fn parse_list(value: &str) -> Vec<String> {
    value.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Into::into)
        .collect()
}

/// Walks `args` (including arg0), handing `-flag[=inline]` to `handle_flag`
/// and everything else to `handle_pos`. `--` ends flag parsing. Either
/// handler can return `Ok(None)` to stop early (e.g. after printing help).
pub fn parse_args<I, F, P, E>(
    mut args: I,
    mut handle_flag: F,
    mut handle_pos: P,
) -> Result<Option<()>, E>
where
    I: Iterator<Item = String>,
    F: FnMut(&str, Option<&str>, &mut I, &str) -> Result<Option<()>, E>,
    P: FnMut(usize, String) -> Result<Option<()>, E>,
{
    let mut in_flags = true;
    let mut pos_index = 0;
    let arg0 = args.next().unwrap_or_else(|| "unknown".into());

    while let Some(arg) = args.next() {
        // a lone "-" is a positional (stdin)
        if in_flags && arg.starts_with('-') && arg != "-" {
            let body = arg[1..].strip_prefix('-').unwrap_or(&arg[1..]);
            let (flag, inline) = match body.split_once('=') {
                Some((flag, inline)) => (flag, Some(inline)),
                None => (body, None),
            };

            if flag.is_empty() && inline.is_none() {
                in_flags = false;
            } else {
                let res = handle_flag(flag, inline, &mut args, &arg0)?;
                if res.is_none() { return Ok(None); }
            }
        } else {
            let res = handle_pos(pos_index, arg)?;
            if res.is_none() { return Ok(None); }
            pos_index += 1;
        }
    }

    Ok(Some(()))
}
