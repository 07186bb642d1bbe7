/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Cascading charset recovery for text parts whose declared charset is
//! missing, wrong, or not faithfully decodable. Candidates are tried
//! strictly first and lossily second, so a later candidate that decodes
//! without replacement always beats an earlier one that does not.

use encoding_rs::Encoding;

/// One decoding candidate in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Candidate {
    /// A named encoding, with the label it was derived from.
    Labeled(&'static Encoding, String),
    /// Strict 7-bit ASCII; `encoding_rs` has no dedicated decoder for it.
    Ascii,
}

/// The outcome of a recovery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovered {
    Decoded {
        text: String,
        /// The charset that produced the text, in its canonical name.
        charset: String,
        /// Whether replacement characters were substituted.
        lossy: bool,
    },
    /// No candidate could decode the bytes, even lossily.
    Undecodable,
}

/// Upgrades charsets that senders commonly mislabel to the superset
/// actually used on the wire.
pub fn upgrade_charset(label: &str) -> &str {
    let l = label.trim();
    if l.eq_ignore_ascii_case("iso-8859-1") || l.eq_ignore_ascii_case("latin1") {
        "windows-1252"
    } else if l.eq_ignore_ascii_case("gb2312") || l.eq_ignore_ascii_case("gbk") {
        "gb18030"
    } else if l.eq_ignore_ascii_case("ks_c_5601-1987") || l.eq_ignore_ascii_case("ksc_5601") {
        "euc-kr"
    } else if l.eq_ignore_ascii_case("shift-jis") || l.eq_ignore_ascii_case("shift_jis") {
        "windows-31j"
    } else {
        l
    }
}

fn is_ascii_label(label: &str) -> bool {
    let l = label.trim();
    l.eq_ignore_ascii_case("us-ascii")
        || l.eq_ignore_ascii_case("ascii")
        || l.eq_ignore_ascii_case("ansi_x3.4-1968")
        || l.eq_ignore_ascii_case("iso-ir-6")
}

fn candidate_for(label: &str) -> Option<Candidate> {
    if is_ascii_label(label) {
        return Some(Candidate::Ascii);
    }
    let upgraded = upgrade_charset(label);
    Encoding::for_label(upgraded.as_bytes())
        .map(|e| Candidate::Labeled(e, upgraded.to_string()))
}

/// Whether a charset label names a decoder this crate can use.
pub fn is_known_charset(label: &str) -> bool {
    is_ascii_label(label) || Encoding::for_label(upgrade_charset(label).as_bytes()).is_some()
}

/// Maps a charset name to the Windows code page identifier stored in
/// the internet code page property. Unlisted charsets fall back to
/// UTF-8 on the property side; the text itself is always converted.
pub fn charset_to_codepage(label: &str) -> Option<u16> {
    let l = upgrade_charset(label);
    Some(match () {
        _ if l.eq_ignore_ascii_case("utf-8") => 65001,
        _ if is_ascii_label(l) => 20127,
        _ if l.eq_ignore_ascii_case("windows-1250") => 1250,
        _ if l.eq_ignore_ascii_case("windows-1251") => 1251,
        _ if l.eq_ignore_ascii_case("windows-1252") => 1252,
        _ if l.eq_ignore_ascii_case("windows-1253") => 1253,
        _ if l.eq_ignore_ascii_case("windows-1254") => 1254,
        _ if l.eq_ignore_ascii_case("windows-1255") => 1255,
        _ if l.eq_ignore_ascii_case("windows-1256") => 1256,
        _ if l.eq_ignore_ascii_case("windows-1257") => 1257,
        _ if l.eq_ignore_ascii_case("windows-1258") => 1258,
        _ if l.eq_ignore_ascii_case("iso-8859-1") => 28591,
        _ if l.eq_ignore_ascii_case("iso-8859-2") => 28592,
        _ if l.eq_ignore_ascii_case("iso-8859-5") => 28595,
        _ if l.eq_ignore_ascii_case("iso-8859-7") => 28597,
        _ if l.eq_ignore_ascii_case("iso-8859-9") => 28599,
        _ if l.eq_ignore_ascii_case("iso-8859-15") => 28605,
        _ if l.eq_ignore_ascii_case("koi8-r") => 20866,
        _ if l.eq_ignore_ascii_case("koi8-u") => 21866,
        _ if l.eq_ignore_ascii_case("gb18030") => 54936,
        _ if l.eq_ignore_ascii_case("gbk") => 936,
        _ if l.eq_ignore_ascii_case("big5") => 950,
        _ if l.eq_ignore_ascii_case("windows-31j") || l.eq_ignore_ascii_case("shift_jis") => 932,
        _ if l.eq_ignore_ascii_case("euc-jp") => 51932,
        _ if l.eq_ignore_ascii_case("iso-2022-jp") => 50220,
        _ if l.eq_ignore_ascii_case("euc-kr") => 949,
        _ if l.eq_ignore_ascii_case("utf-16le") => 1200,
        _ => return None,
    })
}

/// Scans HTML bytes for a `<meta ... charset=...>` declaration. Only the
/// leading few kilobytes matter in practice but the whole slice is
/// searched; the declaration is returned as written, unvalidated.
pub fn sniff_html_charset(html: &[u8]) -> Option<String> {
    let mut pos = 0;
    while let Some(rel) = find_ascii_ci(&html[pos..], b"<meta") {
        let tag_start = pos + rel;
        let tag_end = html[tag_start..]
            .iter()
            .position(|&b| b == b'>')
            .map(|p| tag_start + p)
            .unwrap_or(html.len());
        let tag = &html[tag_start..tag_end];
        if let Some(cpos) = find_ascii_ci(tag, b"charset") {
            let mut i = cpos + b"charset".len();
            while i < tag.len() && (tag[i] == b' ' || tag[i] == b'\t') {
                i += 1;
            }
            if i < tag.len() && tag[i] == b'=' {
                i += 1;
                while i < tag.len()
                    && (tag[i] == b' ' || tag[i] == b'\t' || tag[i] == b'"' || tag[i] == b'\'')
                {
                    i += 1;
                }
                let start = i;
                while i < tag.len()
                    && !matches!(tag[i], b' ' | b'\t' | b'"' | b'\'' | b'/' | b';')
                {
                    i += 1;
                }
                if i > start {
                    if let Ok(s) = std::str::from_utf8(&tag[start..i]) {
                        return Some(s.to_string());
                    }
                }
            }
        }
        pos = tag_end.max(tag_start + 1);
        if pos >= html.len() {
            break;
        }
    }
    None
}

fn find_ascii_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Recovers text from raw bytes given a declared charset, an optional
/// charset sniffed from the content itself, and the caller's default.
///
/// Candidate order is declared, sniffed (`strict_rfc` drops it), then
/// the default when neither a declared nor a sniffed charset exists,
/// with US-ASCII always appended last. Each candidate is tried without
/// replacement first; only when none decodes faithfully are they
/// retried lossily in the same order.
pub fn recover_text(
    bytes: &[u8],
    declared: Option<&str>,
    sniffed: Option<&str>,
    default: Option<&str>,
    strict_rfc: bool,
) -> Recovered {
    let mut candidates: Vec<Candidate> = Vec::with_capacity(4);
    let mut push = |c: Option<Candidate>, list: &mut Vec<Candidate>| {
        if let Some(c) = c {
            if !list.contains(&c) {
                list.push(c);
            }
        }
    };

    if let Some(d) = declared {
        push(candidate_for(d), &mut candidates);
    }
    if !strict_rfc {
        if let Some(s) = sniffed {
            push(candidate_for(s), &mut candidates);
        }
    }
    if declared.is_none() && sniffed.is_none() {
        if let Some(d) = default {
            push(candidate_for(d), &mut candidates);
        }
    }
    if !candidates.contains(&Candidate::Ascii) {
        candidates.push(Candidate::Ascii);
    }

    // Strict pass.
    for cand in &candidates {
        match cand {
            Candidate::Labeled(enc, label) => {
                if let Some(text) = enc.decode_without_bom_handling_and_without_replacement(bytes) {
                    return Recovered::Decoded {
                        text: text.into_owned(),
                        charset: label.clone(),
                        lossy: false,
                    };
                }
            }
            Candidate::Ascii => {
                if bytes.is_ascii() {
                    return Recovered::Decoded {
                        // Safe to assume UTF-8; the bytes are pure ASCII.
                        text: String::from_utf8_lossy(bytes).into_owned(),
                        charset: "us-ascii".into(),
                        lossy: false,
                    };
                }
            }
        }
    }

    // Lossy pass. ASCII has no useful lossy form beyond what a labeled
    // decoder would produce, so only labeled candidates are retried.
    for cand in &candidates {
        if let Candidate::Labeled(enc, label) = cand {
            let (text, _, had_errors) = enc.decode(bytes);
            let _ = had_errors;
            return Recovered::Decoded {
                text: text.into_owned(),
                charset: label.clone(),
                lossy: true,
            };
        }
    }

    Recovered::Undecodable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_charset_wins_when_it_decodes() {
        let bytes = "caf\u{e9}"
            .chars()
            .map(|c| if c == '\u{e9}' { 0xE9u8 } else { c as u8 })
            .collect::<Vec<_>>();
        match recover_text(&bytes, Some("iso-8859-1"), None, None, false) {
            Recovered::Decoded { text, charset, lossy } => {
                assert_eq!(text, "café");
                assert_eq!(charset, "windows-1252");
                assert!(!lossy);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn sniffed_charset_rescues_bad_declaration() {
        // UTF-8 bytes declared as UTF-16 fail strictly under the
        // declaration but decode under the sniffed charset.
        let bytes = "grüße".as_bytes();
        match recover_text(bytes, Some("utf-16le"), Some("utf-8"), None, false) {
            Recovered::Decoded { text, charset, lossy } => {
                assert_eq!(text, "grüße");
                assert_eq!(charset, "utf-8");
                assert!(!lossy);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn strict_rfc_ignores_sniffed() {
        let bytes = "grüße".as_bytes();
        match recover_text(bytes, Some("utf-16le"), Some("utf-8"), None, true) {
            Recovered::Decoded { charset, lossy, .. } => {
                assert_eq!(charset, "utf-16le");
                assert!(lossy);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn default_applies_only_without_declaration() {
        let bytes = b"\xE9t\xE9";
        match recover_text(bytes, None, None, Some("windows-1252"), false) {
            Recovered::Decoded { text, lossy, .. } => {
                assert_eq!(text, "été");
                assert!(!lossy);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_label_with_non_ascii_is_lossy_or_undecodable() {
        assert_eq!(
            recover_text(b"\xFF\xFE", Some("x-no-such-charset"), None, None, false),
            Recovered::Undecodable
        );
        // Pure ASCII always decodes even under an unknown label.
        match recover_text(b"hello", Some("x-no-such-charset"), None, None, false) {
            Recovered::Decoded { text, charset, lossy } => {
                assert_eq!(text, "hello");
                assert_eq!(charset, "us-ascii");
                assert!(!lossy);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn sniff_meta_variants() {
        for (html, expected) in [
            (
                &b"<html><head><meta charset=\"utf-8\"></head>"[..],
                Some("utf-8"),
            ),
            (
                &b"<META HTTP-EQUIV=Content-Type CONTENT=\"text/html; charset=koi8-r\">"[..],
                Some("koi8-r"),
            ),
            (&b"<meta charset = 'GB2312'/>"[..], Some("GB2312")),
            (&b"<meta name=viewport content=width>"[..], None),
            (&b"<meta charset="[..], None),
            (&b"no tags at all"[..], None),
        ] {
            assert_eq!(sniff_html_charset(html).as_deref(), expected, "{html:?}");
        }
    }

    #[test]
    fn upgrade_table() {
        assert_eq!(upgrade_charset("ISO-8859-1"), "windows-1252");
        assert_eq!(upgrade_charset("gb2312"), "gb18030");
        assert_eq!(upgrade_charset("KS_C_5601-1987"), "euc-kr");
        assert_eq!(upgrade_charset("utf-8"), "utf-8");
    }
}
