/// Clause splitter
/// Partitions line-oriented query text into named clauses, keyword first.
use crate::error::{EngineError, EngineResult};

#[derive(Clone, Debug, Default)]
pub struct Clauses {
    pub select: String,
    pub from: String,
    pub group_by: String,
    pub suchthat: String,
    pub having: String,
    pub where_clause: Option<String>,
}

/// Split query text into clauses. One clause per line; the leading token(s)
/// of each line must match a recognized keyword.
pub fn split_clauses(query: &str) -> EngineResult<Clauses> {
    let mut select = None;
    let mut from = None;
    let mut group_by = None;
    let mut suchthat = None;
    let mut having = None;
    let mut where_clause = None;

    for line in query.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.splitn(3, char::is_whitespace);
        let first = tokens.next().unwrap_or("").to_ascii_lowercase();
        let second = tokens.next().unwrap_or("");
        let rest = tokens.next().unwrap_or("");

        // Two-token keyword first: "group by"
        if first == "group" && second.eq_ignore_ascii_case("by") {
            assign(&mut group_by, "group by", rest)?;
            continue;
        }

        let body = join_rest(second, rest);
        match first.as_str() {
            "select" => assign(&mut select, "select", &body)?,
            "from" => assign(&mut from, "from", &body)?,
            "suchthat" => assign(&mut suchthat, "suchthat", &body)?,
            "having" => assign(&mut having, "having", &body)?,
            "where" => assign(&mut where_clause, "where", &body)?,
            other => {
                return Err(EngineError::malformed(format!(
                    "unrecognized clause keyword '{}'",
                    other
                )))
            }
        }
    }

    Ok(Clauses {
        select: required(select, "select")?,
        from: required(from, "from")?,
        group_by: required(group_by, "group by")?,
        suchthat: required(suchthat, "suchthat")?,
        having: required(having, "having")?,
        where_clause,
    })
}

fn join_rest(second: &str, rest: &str) -> String {
    if rest.is_empty() {
        second.to_string()
    } else {
        format!("{} {}", second, rest)
    }
}

fn assign(slot: &mut Option<String>, keyword: &str, body: &str) -> EngineResult<()> {
    if slot.is_some() {
        return Err(EngineError::malformed(format!("duplicate '{}' clause", keyword)));
    }
    *slot = Some(body.trim().to_string());
    Ok(())
}

fn required(slot: Option<String>, keyword: &str) -> EngineResult<String> {
    slot.ok_or_else(|| EngineError::malformed(format!("missing '{}' clause", keyword)))
}

/// Split a clause body on commas at the top level, respecting parentheses
/// and quoted strings. Empty items are dropped.
pub fn split_comma_list(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in text.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '(' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                ',' if depth == 0 => {
                    items.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            },
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
