use reweave_convert::{convert_text, parse_story, Conversion, RewriterRegistry};
use reweave_core::{ConvertOptions, Dialect, EntryType};

fn convert(text: &str, source: Dialect, target: Dialect) -> Conversion {
    let registry = RewriterRegistry::standard().expect("standard registry");
    convert_text(&registry, text, source, target, &ConvertOptions::default())
        .expect("pair is registered")
}

fn entries_of(conversion: &Conversion, feature: &str) -> Vec<EntryType> {
    conversion
        .report
        .as_ref()
        .expect("report requested")
        .entries()
        .iter()
        .filter(|e| e.feature == feature)
        .map(|e| e.entry_type)
        .collect()
}

// ── Harlowe → SugarCube ─────────────────────────────────────────────

#[test]
fn harlowe_set_print_and_link_to_sugarcube() {
    let text = ":: Start\n(set: $gold to 10)\nYou have $gold coins.\n[[Next->Shop]]\n\n:: Shop\nWelcome.\n";
    let conversion = convert(text, Dialect::Harlowe, Dialect::SugarCube);

    let start = conversion.story.passage("Start").expect("start passage");
    assert!(start.content.contains("<<set $gold to 10>>"));
    assert!(start.content.contains("You have $gold coins."));
    assert!(start.content.contains("[[Next|Shop]]"));
    assert_eq!(conversion.story.passage("Shop").map(|p| p.content.as_str()), Some("Welcome."));

    assert_eq!(entries_of(&conversion, "set"), [EntryType::Converted]);
    assert_eq!(entries_of(&conversion, "variable"), [EntryType::Converted]);
    assert_eq!(entries_of(&conversion, "link"), [EntryType::Converted]);
    assert!(conversion.text.contains("\"format\": \"SugarCube\""));
}

// ── Lost constructs ─────────────────────────────────────────────────

#[test]
fn harlowe_dropdown_lost_in_snowman() {
    let text = ":: Start\nPick one: (dropdown: bind $choice, \"A\", \"B\") now.\n";
    let conversion = convert(text, Dialect::Harlowe, Dialect::Snowman);

    let start = conversion.story.passage("Start").expect("start passage");
    assert!(start.content.starts_with("Pick one: <!-- reweave: lost dropdown:"));
    assert!(start.content.ends_with(" --> now."));
    assert_eq!(entries_of(&conversion, "dropdown"), [EntryType::Lost]);

    let report = conversion.report.expect("report requested");
    let lost = report
        .entries()
        .iter()
        .find(|e| e.feature == "dropdown")
        .expect("dropdown entry");
    assert!(lost.notes.is_some());
    assert_eq!(lost.original.as_deref(), Some("(dropdown: bind $choice, \"A\", \"B\")"));
    assert!(report.quality_score() < 100.0);
}

#[test]
fn verbatim_policy_keeps_lost_text() {
    let text = ":: Start\nPick one: (dropdown: bind $choice, \"A\", \"B\") now.\n";
    let registry = RewriterRegistry::standard().expect("standard registry");
    let options = reweave_core::Preset::resolve("verbatim", &[]).expect("known preset");
    let conversion = convert_text(&registry, text, Dialect::Harlowe, Dialect::Snowman, &options)
        .expect("pair is registered");
    let start = conversion.story.passage("Start").expect("start passage");
    assert_eq!(start.content, "Pick one: (dropdown: bind $choice, \"A\", \"B\") now.");
}

// ── Chapbook → Harlowe ──────────────────────────────────────────────

#[test]
fn chapbook_vars_section_to_harlowe() {
    let text = ":: Start\nname: \"Hero\"\n--\nHello {name}!\n";
    let conversion = convert(text, Dialect::Chapbook, Dialect::Harlowe);

    let start = conversion.story.passage("Start").expect("start passage");
    assert!(start.content.contains("(set: $name to \"Hero\")"));
    assert!(start.content.contains("Hello $name!"));
    assert!(!start.content.lines().any(|l| l.trim() == "--"));

    assert_eq!(entries_of(&conversion, "vars-section"), [EntryType::Converted]);
    assert_eq!(entries_of(&conversion, "set"), [EntryType::Converted]);
}

// ── Ink ↔ Harlowe ───────────────────────────────────────────────────

const GATE: &str = "\
VAR gold = 10
You stand at the gate.
{gold > 5: You feel rich.}
* [Enter] -> hall
* [Leave] -> END

=== hall ===
The hall is quiet.
-> END
";

#[test]
fn ink_to_harlowe_and_back() {
    let harlowe = convert(GATE, Dialect::Ink, Dialect::Harlowe);
    let startup = harlowe.story.passage("Startup").expect("startup passage");
    assert!(startup.has_tag("startup"));
    assert!(startup.content.contains("(set: $gold to 10)"));
    let start = harlowe.story.passage("Start").expect("start passage");
    assert!(start.content.contains("(if: $gold > 5)[You feel rich.]"));
    assert!(start.content.contains("[[Enter->hall]]"));
    assert_eq!(harlowe.story.start.as_deref(), Some("Start"));

    let ink = convert(&harlowe.text, Dialect::Harlowe, Dialect::Ink);
    assert_eq!(ink.story.variables.get("gold").map(String::as_str), Some("10"));
    assert!(ink.story.passage("Startup").is_none());
    let names: Vec<&str> = ink.story.passage_names().collect();
    assert_eq!(names, ["Start", "hall"]);

    let (reread, issues) = parse_story(&ink.text, Dialect::Ink);
    assert!(issues.is_empty());
    assert_eq!(reread.variables.get("gold").map(String::as_str), Some("10"));
    let start = reread.passage("Start").expect("start passage");
    assert!(start.content.contains("gold > 5"));
    assert!(start.content.contains("Enter"));
    assert!(start.content.contains("-> hall"));
    assert!(reread.passage("hall").is_some());
}

#[test]
fn ink_choice_is_approximated_in_twine() {
    let conversion = convert(GATE, Dialect::Ink, Dialect::SugarCube);
    assert!(entries_of(&conversion, "choice")
        .iter()
        .all(|t| *t == EntryType::Approximated));
    assert_eq!(entries_of(&conversion, "choice").len(), 2);
}

// ── Pass-through ────────────────────────────────────────────────────

#[test]
fn plain_prose_passes_through() {
    let prose = "The rain had stopped.\nSomewhere, a dog barked twice.";
    let text = format!(":: Start\n{prose}\n");
    for target in [Dialect::SugarCube, Dialect::Chapbook, Dialect::Snowman] {
        let conversion = convert(&text, Dialect::Harlowe, target);
        let start = conversion.story.passage("Start").expect("start passage");
        assert_eq!(start.content, prose, "prose changed for {target}");
        let report = conversion.report.expect("report requested");
        assert!(report.entries().is_empty());
        assert_eq!(report.quality_score(), 100.0);
    }
}

// ── Rule order ──────────────────────────────────────────────────────

#[test]
fn sugarcube_nested_array_is_not_a_link() {
    let text = ":: Start\n<<set $m to [[1, 2]]>>\n";
    let conversion = convert(text, Dialect::SugarCube, Dialect::Harlowe);
    let start = conversion.story.passage("Start").expect("start passage");
    assert!(start.content.starts_with("(set: $m to"));
    assert!(entries_of(&conversion, "link").is_empty());
    assert_eq!(entries_of(&conversion, "set"), [EntryType::Converted]);
}

#[test]
fn harlowe_click_hook_lost_as_a_whole() {
    let text = ":: Start\n(click: ?door)[[[Open->Hall]]]\n\n:: Hall\nIn.\n";
    let conversion = convert(text, Dialect::Harlowe, Dialect::SugarCube);
    assert_eq!(entries_of(&conversion, "click"), [EntryType::Lost]);
    assert!(entries_of(&conversion, "link").is_empty());
    let start = conversion.story.passage("Start").expect("start passage");
    assert!(start.content.contains("/* reweave: lost click: (click: ?door)[[[Open->Hall]]] */"));
}
