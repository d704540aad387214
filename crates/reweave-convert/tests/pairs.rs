use reweave_convert::{convert_text, detect_dialect, RewriterRegistry};
use reweave_core::{ConversionReport, ConvertOptions, CoreError, Dialect, Story};

const HARLOWE: &str = r#":: Start
(set: $gold to 10)(set: _t to 2)
You have $gold gold and _t.
(if: $gold > 5)[Rich!](else-if: $gold > 2)[Okay.](else:)[Poor.]
(unless: $met)[Stranger.]
(print: (either: "a", "b"))
(set: $bag to (a: 1, 2))(set: $map to (dm: "k", 1))
(dropdown: bind $choice, "A", "B")
(live: 2s)[tick](click: ?door)[[[x]]]
|door>[A door.]
(link: "Open")[It opens.]
(display: "Shop")
[[Next->Shop]] [[Shop<-Back]] [[Shop]]
<!-- note -->
(go-to: "Shop")

:: Shop
Welcome.(if: visits > 1)[Again.]
"#;

const SUGARCUBE: &str = r#":: StoryInit
<<set $gold to 10>>

:: Start
<<set _t to 2>>You have $gold and _t.
<<if $gold > 5>>Rich<<elseif $gold > 2>>Okay<<else>>Poor<</if>>
<<print either("a", "b")>>
<<set $bag to [1, 2]>><<set $m to {"k": 1}>>
<<textbox "$name" "Hero">>
<<linkreplace "Open">>It opens.<</linkreplace>>
<<timed 2s>>tick<</timed>>
<<include "Shop">>
[[Next|Shop]] [[Buy|Shop][$gold to $gold - 1]]
/* note */
<<back>>
<<goto "Shop">>

:: Shop
Welcome.<<if visited("Start") > 1>>Again.<</if>>

:: Code [script]
window.x = 1;
"#;

const CHAPBOOK: &str = r#":: Start
gold: 10
met (gold > 5): true
--
You have {gold} gold.

[if gold > 5]
Rich.

[else]
Poor.

[continue]
{embed passage: 'Shop'}
{reveal link: 'Open', passage: 'Shop'}
{back link}
[[Shop]]

:: Shop
Welcome.
"#;

const SNOWMAN: &str = r#":: Start
<% s.gold = 10; %>
Gold: <%= s.gold %>
<% if (s.gold > 5) { %>Rich<% } else { %>Poor<% } %>
[[Next->Shop]]
<!-- note -->

:: Shop
Welcome.
"#;

const INK: &str = r#"VAR gold = 10
Hello.
~ temp t = 2
{gold > 5: Rich|Poor}
{shuffle: a|b}
* [Shop] -> shop
+ [Wait] -> wait
- Gathered.
// note
-> END

=== shop ===
Welcome. <> Glued.
{shop > 1: Again.}
-> wait

=== wait ===
Waiting. # mood
-> DONE
"#;

fn sample(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Harlowe => HARLOWE,
        Dialect::SugarCube => SUGARCUBE,
        Dialect::Chapbook => CHAPBOOK,
        Dialect::Snowman => SNOWMAN,
        Dialect::Ink => INK,
    }
}

fn all_pairs() -> impl Iterator<Item = (Dialect, Dialect)> {
    Dialect::ALL
        .into_iter()
        .flat_map(|s| Dialect::ALL.into_iter().map(move |t| (s, t)))
        .filter(|(s, t)| s != t)
}

// ── Every pair ──────────────────────────────────────────────────────

#[test]
fn every_pair_converts() {
    let registry = RewriterRegistry::standard().expect("standard registry");
    for (source, target) in all_pairs() {
        let conversion = convert_text(
            &registry,
            sample(source),
            source,
            target,
            &ConvertOptions::default(),
        )
        .unwrap_or_else(|e| panic!("{source} -> {target}: {e}"));
        assert_eq!(conversion.story.format, target);
        assert!(!conversion.text.is_empty());

        let report = conversion.report.expect("report requested");
        assert!(!report.entries().is_empty(), "{source} -> {target}: empty report");
        let score = report.quality_score();
        assert!((0.0..=100.0).contains(&score), "{source} -> {target}: {score}");
        assert_eq!(report.passage_count, conversion.story.passages.len());
    }
}

#[test]
fn recorded_features_come_from_the_matrix() {
    let registry = RewriterRegistry::standard().expect("standard registry");
    for (source, target) in all_pairs() {
        let pair = registry.get(source, target).expect("registered");
        let conversion = convert_text(
            &registry,
            sample(source),
            source,
            target,
            &ConvertOptions::default(),
        )
        .expect("registered");
        for entry in conversion.report.expect("report requested").entries() {
            assert!(
                pair.matrix.lookup(&entry.feature).is_some(),
                "{source} -> {target}: {} not in matrix",
                entry.feature
            );
        }
    }
}

#[test]
fn parallel_run_matches_sequential_for_every_pair() {
    let registry = RewriterRegistry::standard().expect("standard registry");
    let parallel = ConvertOptions {
        parallel: true,
        ..ConvertOptions::default()
    };
    for (source, target) in all_pairs() {
        let a = convert_text(&registry, sample(source), source, target, &ConvertOptions::default())
            .expect("registered");
        let b = convert_text(&registry, sample(source), source, target, &parallel)
            .expect("registered");
        assert_eq!(a.text, b.text, "{source} -> {target}");
    }
}

#[test]
fn unregistered_pair_is_an_error() {
    let registry = RewriterRegistry::empty();
    let err = convert_text(
        &registry,
        HARLOWE,
        Dialect::Harlowe,
        Dialect::Ink,
        &ConvertOptions::default(),
    )
    .expect_err("nothing registered");
    assert!(matches!(
        err,
        CoreError::UnsupportedPair {
            from: Dialect::Harlowe,
            to: Dialect::Ink
        }
    ));
}

#[test]
fn samples_are_detected() {
    for dialect in Dialect::ALL {
        assert_eq!(detect_dialect(sample(dialect)), Some(dialect));
    }
}

// ── Reports ─────────────────────────────────────────────────────────

#[test]
fn report_survives_json() {
    let registry = RewriterRegistry::standard().expect("standard registry");
    let conversion = convert_text(
        &registry,
        HARLOWE,
        Dialect::Harlowe,
        Dialect::Chapbook,
        &ConvertOptions::default(),
    )
    .expect("registered");
    let report = conversion.report.expect("report requested");
    let json = report.to_json_pretty().expect("serializable");
    let back = ConversionReport::from_json(&json).expect("own output parses");
    assert_eq!(back.entries(), report.entries());
    assert_eq!(back.passage_count, report.passage_count);
    assert_eq!(back.summary(), report.summary());
}

#[test]
fn merged_reports_add_up() {
    let registry = RewriterRegistry::standard().expect("standard registry");
    let run = |source: Dialect| {
        convert_text(&registry, sample(source), source, Dialect::Snowman, &ConvertOptions::default())
            .expect("registered")
            .report
            .expect("report requested")
    };
    let mut merged = run(Dialect::Harlowe);
    let other = run(Dialect::SugarCube);
    let total = merged.entries().len() + other.entries().len();
    let passages = merged.passage_count + other.passage_count;
    merged.merge(other);
    assert_eq!(merged.entries().len(), total);
    assert_eq!(merged.passage_count, passages);
}

#[test]
fn identity_conversion_keeps_story() {
    let registry = RewriterRegistry::standard().expect("standard registry");
    for dialect in Dialect::ALL {
        let conversion = convert_text(
            &registry,
            sample(dialect),
            dialect,
            dialect,
            &ConvertOptions::default(),
        )
        .expect("identity never fails");
        let (story, _): (Story, _) = reweave_convert::parse_story(sample(dialect), dialect);
        assert_eq!(conversion.story, story);
        let report = conversion.report.expect("report requested");
        assert!(report.entries().is_empty());
        assert_eq!(report.quality_score(), 100.0);
    }
}
