use once_cell::sync::Lazy;
use regex::Regex;

use crate::sentinels::METADATA_TOKEN_RE;

static BR_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:<br\s*/?>\s*){3,}").expect("br run regex"));
static EMPTY_WRAPPER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<(p|span|div)(?:\s[^>]*)?>(?:\s|&nbsp;|&#160;|\x{00A0})*</(?:p|span|div)>"#)
        .expect("empty wrapper regex")
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub br_runs: usize,
    pub empty_wrappers: usize,
    pub leftover_tokens: usize,
}

/// Final pass over serialized output: caps line-break runs at two, drops wrappers that ended
/// up empty, and strips metadata tokens nobody substituted.
pub fn tidy_html(html: &str) -> (String, CleanupStats) {
    let mut stats = CleanupStats::default();

    stats.br_runs = BR_RUN_RE.find_iter(html).count();
    let mut out = BR_RUN_RE.replace_all(html, "<br><br>").into_owned();

    // Removing one wrapper can empty its parent.
    loop {
        let mut removed = 0usize;
        let next = EMPTY_WRAPPER_RE.replace_all(&out, |caps: &regex::Captures<'_>| {
            let whole = &caps[0];
            let open = &caps[1];
            let close_ok = whole
                .rsplit("</")
                .next()
                .is_some_and(|c| c.trim_end_matches('>').eq_ignore_ascii_case(open));
            if close_ok {
                removed += 1;
                String::new()
            } else {
                whole.to_string()
            }
        });
        if removed == 0 {
            break;
        }
        out = next.into_owned();
        stats.empty_wrappers += removed;
    }

    stats.leftover_tokens = METADATA_TOKEN_RE.find_iter(&out).count();
    if stats.leftover_tokens > 0 {
        out = METADATA_TOKEN_RE.replace_all(&out, "").into_owned();
    }
    (out, stats)
}
