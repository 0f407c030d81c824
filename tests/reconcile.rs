use template_mapper::html::TemplateDocument;
use template_mapper::ir::{MatchStrategy, RemovalReason, SectionKind, SectionOutcome};
use template_mapper::sentinels::EMBEDDED_PLACEHOLDER_RE;
use template_mapper::{
    analyze, reconcile, reconcile_with_report, ContentBlock, MapperConfig, MetadataValues,
    TemplateType,
};

const REPORT_TEMPLATE: &str = r##"<!DOCTYPE html>
<html><head><title>Slutrapport</title><style>p { margin: 0 }</style></head>
<body>
<div class="report">
<img src="logo.png" alt="Logo">
<h1>Slutrapport</h1>
<p>Datum: [Dagens datum]</p>
<p>Namn: [Förnamn] [Efternamn]</p>
<table>
<tr><td bgcolor="#cccccc">Hälsa</td><td>(Beskriv hälsan)</td></tr>
<tr><td bgcolor="#cccccc">Skola</td><td>[Text]</td></tr>
</table>
<p><b>Utbildning</b></p>
<p>(Beskriv skolgång)</p>
<br><br><br><br>
<p><strong>Fritid och intressen</strong></p>
<p>Beskriv fritiden.</p>
<h2>Familj</h2>
<p>(Beskriv familjen)</p>
<hr>
<p>Underskrift: ____</p>
</div>
</body></html>
"##;

fn blocks(items: &[(&str, &[&str])]) -> Vec<ContentBlock> {
    items
        .iter()
        .map(|(n, b)| ContentBlock::new(*n, b.iter().map(|s| s.to_string()).collect()))
        .collect()
}

fn report_blocks() -> Vec<ContentBlock> {
    blocks(&[
        ("Hälsa", &["Patienten mår bra"]),
        ("Skola", &["information saknas"]),
        ("Fritid", &["Spelar {{HIGHLIGHT}}fotboll{{/HIGHLIGHT}}", "N/A"]),
        ("Familj", &["Bor med mamma", "Har två syskon"]),
    ])
}

fn metadata() -> MetadataValues {
    MetadataValues {
        today: "2024-05-02".to_string(),
        first_name: "Anna".to_string(),
        last_name: "Berg".to_string(),
        ..MetadataValues::default()
    }
}

fn landmarks(html: &str) -> Vec<String> {
    let doc = TemplateDocument::parse(html);
    doc.elements_named(&["img", "title", "style", "hr"])
        .into_iter()
        .map(|n| doc.outer_html(n))
        .collect()
}

#[test]
fn report_template_end_to_end() {
    let cfg = MapperConfig::default();
    let analysis = analyze(REPORT_TEMPLATE, &cfg);
    assert_eq!(analysis.template_type, TemplateType::Mixed);
    assert_eq!(
        analysis.section_names(),
        vec!["Hälsa", "Skola", "Utbildning", "Fritid och intressen", "Familj"]
    );

    let (out, report) = reconcile_with_report(REPORT_TEMPLATE, &report_blocks(), &metadata(), &cfg);

    assert!(out.contains("<p>Datum: 2024-05-02</p>"));
    assert!(out.contains("<p>Namn: Anna Berg</p>"));
    assert!(out.contains("<td bgcolor=\"#cccccc\">Hälsa</td><td><ul class=\"mapped-bullets\""));
    assert!(!out.contains("Skola"));
    assert!(!out.contains("Utbildning"));
    assert!(out.contains("<strong>Fritid och intressen</strong>"));
    assert!(out.contains(">fotboll</span>"));
    assert!(out.contains("<h2>Familj</h2>"));
    assert!(out.contains("<p>Underskrift: ____</p>"));
    assert!(!out.contains("Beskriv"));
    assert!(!out.contains("<br><br><br>"));

    assert_eq!(report.filled().count(), 3);
    assert_eq!(report.removed().count(), 2);
    assert_eq!(report.list_items, 4);
    assert!(report.landmarks_intact);
}

#[test]
fn no_placeholders_survive() {
    let out = reconcile(REPORT_TEMPLATE, &report_blocks(), &metadata(), &MapperConfig::default());
    let body = out.split("<body>").nth(1).unwrap_or(&out);
    assert!(
        !EMBEDDED_PLACEHOLDER_RE.is_match(body),
        "leftover placeholder in: {body}"
    );
}

#[test]
fn each_fill_inserts_one_list_with_valid_bullets_only() {
    let (out, report) = reconcile_with_report(
        REPORT_TEMPLATE,
        &report_blocks(),
        &metadata(),
        &MapperConfig::default(),
    );
    assert_eq!(out.matches("<ul ").count(), 3);
    assert_eq!(out.matches("class=\"mapped-bullets\"").count(), 3);
    assert_eq!(out.matches("<li ").count(), 4);
    match report.outcome_of("Fritid och intressen") {
        Some(SectionOutcome::Filled { items, .. }) => assert_eq!(*items, 1),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn reconciliation_is_deterministic() {
    let cfg = MapperConfig::default();
    let a = reconcile(REPORT_TEMPLATE, &report_blocks(), &metadata(), &cfg);
    let b = reconcile(REPORT_TEMPLATE, &report_blocks(), &metadata(), &cfg);
    assert_eq!(a, b);
}

#[test]
fn attribute_order_is_stable_across_runs() {
    let html = "<img src=\"logo.png\" alt=\"Logo\" width=\"120\"><h2>Skola</h2><p>(x)</p>";
    let items = blocks(&[("Skola", &["Går bra"])]);
    let cfg = MapperConfig::default();
    let first = reconcile(html, &items, &MetadataValues::default(), &cfg);
    assert!(first.starts_with(
        "<img src=\"logo.png\" alt=\"Logo\" width=\"120\"><h2>Skola</h2><div class=\"mapped-bullets\" style="
    ));
    for _ in 0..50 {
        assert_eq!(reconcile(html, &items, &MetadataValues::default(), &cfg), first);
    }
}

#[test]
fn exact_name_beats_an_earlier_colon_header() {
    let (out, report) = reconcile_with_report(
        "<p><b>Skola:</b></p><p>(x)</p><h2>Skola</h2><p>(y)</p>",
        &blocks(&[("Skola", &["Går bra"])]),
        &MetadataValues::default(),
        &MapperConfig::default(),
    );
    assert!(matches!(
        report.outcome_of("Skola"),
        Some(SectionOutcome::Filled { strategy: MatchStrategy::Exact, score: 100, .. })
    ));
    assert_eq!(
        report.outcome_of("Skola:"),
        Some(&SectionOutcome::Removed {
            reason: RemovalReason::Unmatched
        })
    );
    assert!(out.starts_with("<h2>Skola</h2><div class=\"mapped-bullets\""));
}

#[test]
fn exact_match_wins_regardless_of_block_order() {
    let html = "<h2>Hälsa och välmående</h2><p>(x)</p><h2>Hälsa</h2><p>(y)</p>";
    let mut items = blocks(&[
        ("Hälsa och välmående", &["a"]),
        ("hälsa", &["b"]),
        ("Fritid", &["c"]),
    ]);
    for _ in 0..items.len() {
        let (_, report) =
            reconcile_with_report(html, &items, &MetadataValues::default(), &MapperConfig::default());
        for name in ["Hälsa", "Hälsa och välmående"] {
            match report.outcome_of(name) {
                Some(SectionOutcome::Filled { strategy, score, .. }) => {
                    assert_eq!(*strategy, MatchStrategy::Exact);
                    assert_eq!(*score, 100);
                }
                other => panic!("{name}: unexpected outcome {other:?}"),
            }
        }
        items.rotate_left(1);
    }
}

#[test]
fn structure_outside_sections_is_untouched() {
    let out = reconcile(REPORT_TEMPLATE, &report_blocks(), &metadata(), &MapperConfig::default());
    assert_eq!(landmarks(REPORT_TEMPLATE), landmarks(&out));
    assert!(out.contains("<h1>Slutrapport</h1>"));
}

#[test]
fn table_header_cell_receives_the_list() {
    let html = "<table><tr><td bgcolor=\"#cccccc\">Hälsa</td><td>(Beskriv hälsan)</td></tr></table>";
    let out = reconcile(
        html,
        &blocks(&[("Hälsa", &["Patienten mår bra"])]),
        &MetadataValues::default(),
        &MapperConfig::default(),
    );
    assert!(out.contains("<td bgcolor=\"#cccccc\">Hälsa</td>"));
    assert_eq!(out.matches("<ul").count(), 1);
    assert_eq!(out.matches("<li ").count(), 1);
    assert!(out.contains(">Patienten mår bra</li></ul></td>"));
    assert!(!out.contains("Beskriv"));
}

#[test]
fn unmatched_bold_section_is_removed_with_its_instruction() {
    let html = "<p><b>Utbildning</b></p><p>(Beskriv skolgång)</p><p><b>Hälsa</b></p><p>(Beskriv hälsa)</p>";
    let (out, report) = reconcile_with_report(
        html,
        &blocks(&[("Hälsa", &["Mår bra"])]),
        &MetadataValues::default(),
        &MapperConfig::default(),
    );
    assert!(!out.contains("Utbildning"));
    assert!(!out.contains("Beskriv skolgång"));
    assert!(out.starts_with("<p><b>Hälsa</b></p><div class=\"mapped-bullets\""));
    assert_eq!(
        report.outcome_of("Utbildning"),
        Some(&SectionOutcome::Removed {
            reason: RemovalReason::Unmatched
        })
    );
}

#[test]
fn broader_block_name_still_fills_section() {
    let (out, report) = reconcile_with_report(
        "<h2>Hälsa</h2><p>[Text]</p>",
        &blocks(&[("Hälsa och Välmående", &["Mår bra"])]),
        &MetadataValues::default(),
        &MapperConfig::default(),
    );
    assert!(out.contains(">Mår bra</li>"));
    match report.outcome_of("Hälsa") {
        Some(SectionOutcome::Filled { score, .. }) => assert!(*score >= 50),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn reordered_words_match_by_token_overlap() {
    let (_, report) = reconcile_with_report(
        "<h2>Fysisk och psykisk hälsa</h2><p>(x)</p>",
        &blocks(&[("Psykisk hälsa, fysisk", &["Mår bra"])]),
        &MetadataValues::default(),
        &MapperConfig::default(),
    );
    assert_eq!(
        report.outcome_of("Fysisk och psykisk hälsa"),
        Some(&SectionOutcome::Filled {
            block: "Psykisk hälsa, fysisk".to_string(),
            strategy: MatchStrategy::TokenOverlap,
            score: 70,
            items: 1,
        })
    );
}

#[test]
fn placeholder_only_block_triggers_removal() {
    let (out, report) = reconcile_with_report(
        "<h2>Hälsa</h2><p>(Beskriv hälsa)</p><h2>Skola</h2><p>Går i åk 8.</p>",
        &blocks(&[("Hälsa", &["information saknas"])]),
        &MetadataValues::default(),
        &MapperConfig::default(),
    );
    assert!(!out.contains("Hälsa"));
    assert!(!out.contains("<ul"));
    assert_eq!(
        report.outcome_of("Hälsa"),
        Some(&SectionOutcome::Removed {
            reason: RemovalReason::NoRealContent
        })
    );
}

#[test]
fn plain_text_headers_use_the_pattern_fallback() {
    let html = "<p>Bakgrund och orsak</p><p>(Beskriv bakgrunden)</p>";
    let analysis = analyze(html, &MapperConfig::default());
    assert_eq!(analysis.sections.len(), 1);
    assert_eq!(analysis.sections[0].kind, SectionKind::TextPattern);

    let out = reconcile(
        html,
        &blocks(&[("Bakgrund", &["Flyttade 2020"])]),
        &MetadataValues::default(),
        &MapperConfig::default(),
    );
    assert!(out.starts_with("<p>Bakgrund och orsak</p><div class=\"mapped-bullets\""));
    assert!(!out.contains("Beskriv"));
}

#[test]
fn stray_bracket_tokens_do_not_survive() {
    let out = reconcile(
        "<h1>Rapport</h1><p>Handläggare: [Handläggare]</p><h2>Skola</h2><p>(x)</p>",
        &blocks(&[("Skola", &["Går bra"])]),
        &MetadataValues::default(),
        &MapperConfig::default(),
    );
    assert!(!out.contains("[Handläggare]"));
    assert!(out.contains("<p>Handläggare:</p>"));
    assert!(out.contains(">Går bra</li>"));
}

#[test]
fn header_cell_without_content_cell_degrades_to_removal() {
    let html = concat!(
        "<table><tbody><tr><td bgcolor=\"#cccccc\">Hälsa</td></tr></tbody></table>",
        "<h2>Skola</h2><p>(Beskriv skolgång)</p>"
    );
    let (out, report) = reconcile_with_report(
        html,
        &blocks(&[("Hälsa", &["Mår bra"]), ("Skola", &["Går i åk 8"])]),
        &MetadataValues::default(),
        &MapperConfig::default(),
    );
    assert_eq!(
        report.outcome_of("Hälsa"),
        Some(&SectionOutcome::Removed {
            reason: RemovalReason::InsertFailed
        })
    );
    assert!(!out.contains("Hälsa"));
    assert!(!out.contains("<tr>"));
    assert!(matches!(
        report.outcome_of("Skola"),
        Some(SectionOutcome::Filled { items: 1, .. })
    ));
    assert!(out.contains("<h2>Skola</h2><div class=\"mapped-bullets\""));
    assert!(!out.contains("Beskriv"));
}

#[test]
fn styled_text_section_fills_after_its_paragraph() {
    let html = concat!(
        "<p><span style=\"font-family: 'Times New Roman'\">Fritid och intressen</span></p>",
        "<p>(Beskriv fritiden)</p>",
        "<p>Slut.</p>"
    );
    let (out, report) = reconcile_with_report(
        html,
        &blocks(&[("Fritid", &["Spelar fotboll"])]),
        &MetadataValues::default(),
        &MapperConfig::default(),
    );
    assert_eq!(report.sections[0].kind, SectionKind::StyledText);
    assert!(out.starts_with(concat!(
        "<p><span style=\"font-family: 'Times New Roman'\">Fritid och intressen</span></p>",
        "<div class=\"mapped-bullets\""
    )));
    assert!(out.ends_with("Spelar fotboll</li></ul></div><p>Slut.</p>"));
    assert!(!out.contains("Beskriv"));
}

#[test]
fn template_without_sections_passes_through() {
    let html = "<p>Bara löptext utan rubriker.</p>";
    let analysis = analyze(html, &MapperConfig::default());
    assert_eq!(analysis.template_type, TemplateType::Unknown);
    let out = reconcile(
        html,
        &blocks(&[("Hälsa", &["x"])]),
        &MetadataValues::default(),
        &MapperConfig::default(),
    );
    assert_eq!(out, html);
}
