//! Escape discipline for textual value formats.
//!
//! `\` is always escapable outside the dedicated "unescaped" format. `;` and
//! a leading `[` are escaped in the primary binary-text format. Tab and a
//! comma inside a container are escaped in the legacy Zeek formats.
//! Non-ASCII is escaped in the ASCII-only legacy format. Resolved from
//! `spec.md` §4.1; there is no `original_source/zng/escape.go` in the
//! retained source set, so the byte-string (`\xHH`/`\\`) and string
//! (`\uHHHH`/`\u{H..}`) escape syntaxes are implemented directly from the
//! spec's description.

/// Output text format, controlling escape discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutFmt {
    /// Primary binary-text format (ZSON-like).
    Primary,
    /// Debug format used by `Value::to_string` — never escapes.
    Unescaped,
    /// Legacy Zeek TSV format (escapes tab, comma-in-container).
    ZeekTsv,
    /// Legacy Zeek ASCII format (additionally escapes non-ASCII).
    ZeekAscii,
}

/// Whether `c` must be backslash-escaped when writing in `fmt`, given
/// whether we are formatting an element nested inside a container.
pub fn should_escape(c: char, fmt: OutFmt, in_container: bool, leading: bool) -> bool {
    if fmt == OutFmt::Unescaped {
        return false;
    }
    if c == '\\' {
        return true;
    }
    match fmt {
        OutFmt::Primary => c == ';' || (leading && c == '['),
        OutFmt::ZeekTsv => c == '\t' || (in_container && c == ','),
        OutFmt::ZeekAscii => c == '\t' || (in_container && c == ',') || !c.is_ascii(),
        OutFmt::Unescaped => unreachable!(),
    }
}

/// Escape a raw byte string using `\xHH` for non-printable/escaped bytes and
/// `\\` for a literal backslash. Any other byte passes through unescaped.
pub fn escape_bytes(bytes: &[u8], fmt: OutFmt, in_container: bool) -> String {
    let mut out = String::with_capacity(bytes.len());
    for (i, &b) in bytes.iter().enumerate() {
        let c = b as char;
        if should_escape(c, fmt, in_container, i == 0) || !(0x20..0x7f).contains(&b) {
            out.push_str(&format!("\\x{:02x}", b));
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode a `\xHH`/`\\`-escaped byte string back to raw bytes. Any other
/// backslash sequence is passed through literally (per spec §4.1).
pub fn unescape_bytes(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'x' if i + 3 < bytes.len() || i + 4 <= bytes.len() => {
                    if let Some(hex) = bytes.get(i + 2..i + 4) {
                        if let Ok(hexstr) = std::str::from_utf8(hex) {
                            if let Ok(v) = u8::from_str_radix(hexstr, 16) {
                                out.push(v);
                                i += 4;
                                continue;
                            }
                        }
                    }
                    out.push(bytes[i]);
                    i += 1;
                }
                b'\\' => {
                    out.push(b'\\');
                    i += 2;
                    continue;
                }
                _ => {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

/// Escape a UTF-8 string using `\uHHHH` for escaped code points.
pub fn escape_string(s: &str, fmt: OutFmt, in_container: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        if should_escape(c, fmt, in_container, i == 0) {
            out.push_str(&format!("\\u{:04x}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode `\uHHHH` and `\u{H..}` (1-6 hex digits) escapes in a string back to
/// their code points. Unrecognized backslash sequences pass through literally.
pub fn unescape_string(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() && chars[i + 1] == 'u' {
            if i + 2 < chars.len() && chars[i + 2] == '{' {
                let mut j = i + 3;
                let mut hex = String::new();
                while j < chars.len() && chars[j] != '}' && hex.len() < 6 {
                    hex.push(chars[j]);
                    j += 1;
                }
                if j < chars.len() && chars[j] == '}' && !hex.is_empty() {
                    if let Ok(v) = u32::from_str_radix(&hex, 16) {
                        if let Some(c) = char::from_u32(v) {
                            out.push(c);
                            i = j + 1;
                            continue;
                        }
                    }
                }
                out.push(chars[i]);
                i += 1;
            } else if i + 5 < chars.len() {
                let hex: String = chars[i + 2..i + 6].iter().collect();
                if let Ok(v) = u32::from_str_radix(&hex, 16) {
                    if let Some(c) = char::from_u32(v) {
                        out.push(c);
                        i += 6;
                        continue;
                    }
                }
                out.push(chars[i]);
                i += 1;
            } else {
                out.push(chars[i]);
                i += 1;
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}
