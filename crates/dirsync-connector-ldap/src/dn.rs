//! Distinguished Name helpers (RFC 4514).
//!
//! Only what change resolution needs: splitting a DN into its RDNs, reading
//! the naming attribute, comparing DNs and composing the DN of a moved entry.

/// The naming attribute of an entry, taken from the first RDN of its DN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdn {
    /// Attribute type (e.g., "cn").
    pub attribute: String,
    /// Unescaped attribute value (e.g., "Alice").
    pub value: String,
}

impl Rdn {
    /// Parse the first RDN of a DN.
    ///
    /// Multi-valued RDNs (`cn=a+sn=b`) yield their first attribute.
    /// Returns `None` when the DN is empty or has no `=`.
    pub fn parse(dn: &str) -> Option<Self> {
        let first = split_rdns(dn).into_iter().next()?;
        let first_ava = split_unescaped(&first, '+').into_iter().next()?;
        let (attribute, value) = first_ava.split_once('=')?;
        let attribute = attribute.trim();
        if attribute.is_empty() {
            return None;
        }
        Some(Self {
            attribute: attribute.to_string(),
            value: unescape_value(value.trim()),
        })
    }
}

/// Split a DN into its RDN components, honouring escapes and quotes.
///
/// Components are returned trimmed and with their escapes intact.
pub fn split_rdns(dn: &str) -> Vec<String> {
    split_unescaped(dn, ',')
        .into_iter()
        .map(|rdn| rdn.trim().to_string())
        .filter(|rdn| !rdn.is_empty())
        .collect()
}

fn split_unescaped(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut quoted = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                current.push(ch);
                quoted = !quoted;
            }
            c if c == separator && !quoted => {
                parts.push(std::mem::take(&mut current));
            }
            // Legacy RFC 1779 separator.
            ';' if separator == ',' && !quoted => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

/// Remove RFC 4514 escaping from an attribute value.
pub fn unescape_value(value: &str) -> String {
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);

    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let Some(next) = chars.next() else {
            break;
        };
        let hex_pair = chars
            .peek()
            .filter(|_| next.is_ascii_hexdigit())
            .and_then(|second| second.to_digit(16).zip(next.to_digit(16)));
        match hex_pair {
            Some((low, high)) => {
                chars.next();
                bytes.push((high * 16 + low) as u8);
            }
            None => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(next.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Get the parent DN, or `None` for a single-RDN DN.
pub fn parent(dn: &str) -> Option<String> {
    let rdns = split_rdns(dn);
    if rdns.len() < 2 {
        return None;
    }
    Some(rdns[1..].join(","))
}

/// Normalize a DN for comparison.
///
/// Lowercases and strips insignificant whitespace around separators.
pub fn normalize(dn: &str) -> String {
    split_rdns(dn)
        .iter()
        .map(|rdn| {
            split_unescaped(rdn, '+')
                .iter()
                .map(|ava| match ava.split_once('=') {
                    Some((attr, value)) => {
                        format!("{}={}", attr.trim(), value.trim()).to_lowercase()
                    }
                    None => ava.trim().to_lowercase(),
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Compare two DNs ignoring case and insignificant whitespace.
pub fn dn_equals(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Compose the DN of an entry after a rename or move.
///
/// Without a new superior the entry stays under its current parent.
pub fn compose_moved_dn(old_dn: &str, new_rdn: &str, new_superior: Option<&str>) -> String {
    let new_rdn = new_rdn.trim();
    let superior = new_superior
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| parent(old_dn));

    match superior {
        Some(superior) => format!("{new_rdn},{superior}"),
        None => new_rdn.to_string(),
    }
}
