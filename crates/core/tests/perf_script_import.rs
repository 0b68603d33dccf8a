//! Integration tests: import `perf script` output end to end and check the
//! resulting profile groups and call trees.

use std::sync::Arc;

use flame_cat_core::model::{CallTreeNode, Profile, ProfileGroup};
use flame_cat_core::parsers::{ImportResult, import_auto, import_perf_script};
use flame_cat_protocol::ValueFormatter;
use pretty_assertions::assert_eq;

const EPS: f64 = 1e-9;

fn import(text: &str) -> ProfileGroup {
    match import_perf_script(text) {
        ImportResult::Recognized(group) => group,
        ImportResult::NotRecognized => panic!("expected perf script to be recognized"),
    }
}

fn node<'a>(profile: &'a Profile, path: &[&str]) -> &'a CallTreeNode {
    let tree = profile.tree();
    let mut current = tree.root();
    for name in path {
        current = tree
            .children(current.id)
            .find(|child| child.name() == *name)
            .unwrap_or_else(|| panic!("no node {name:?} under {:?}", current.name()));
    }
    current
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPS,
        "expected {expected}, got {actual}"
    );
}

fn assert_weight_conservation(profile: &Profile) {
    let tree = profile.tree();
    let check = |n: &CallTreeNode| {
        let children: f64 = tree.children(n.id).map(|c| c.total_weight).sum();
        assert_close(n.total_weight, n.self_weight + children);
    };
    check(tree.root());
    tree.walk(|n, _| check(n));
    assert_close(tree.root().total_weight, profile.total_weight());
}

#[test]
fn two_identical_samples_form_one_path() {
    let text = "foo 1234 1000.000000: cycles:\n\
                \tffffffff81000001 baz (/bin/foo)\n\
                \tffffffff81000002 bar (/bin/foo)\n\
                \n\
                foo 1234 1000.002000: cycles:\n\
                \tffffffff81000001 baz (/bin/foo)\n\
                \tffffffff81000002 bar (/bin/foo)\n";
    let group = import(text);

    assert_eq!(group.name, "foo tid: 1234");
    assert_eq!(group.index_to_view, 0);
    assert_eq!(group.profiles.len(), 1);

    let profile = &group.profiles[0];
    assert_eq!(profile.name(), "foo tid: 1234");
    assert_eq!(profile.value_formatter(), ValueFormatter::seconds());
    assert_close(profile.total_weight(), 0.002);

    let bar = node(profile, &["bar"]);
    assert_close(bar.total_weight, 0.002);
    assert_close(bar.self_weight, 0.0);
    let baz = node(profile, &["bar", "baz"]);
    assert_close(baz.total_weight, 0.002);
    assert_close(baz.self_weight, 0.002);
    assert_eq!(profile.tree().len(), 3);
    assert_eq!(profile.format_value(baz.self_weight), "2.0ms");
}

#[test]
fn record_without_timestamp_is_not_recognized() {
    let text = "foo 1234 1000: cycles:\n\tffffffff81000001 bar (/bin/foo)\n";
    assert!(!import_perf_script(text).is_recognized());
}

#[test]
fn first_event_type_wins() {
    let text = "foo 1 1.000000: cycles:\n\t1 a (/x)\n\n\
                foo 1 1.500000: cache-misses:\n\t2 b (/x)\n\n\
                foo 1 2.000000: cycles:\n\t1 a (/x)\n";
    let group = import(text);
    assert_eq!(group.profiles.len(), 1);

    let profile = &group.profiles[0];
    let names: Vec<_> = profile.tree().children(0).map(CallTreeNode::name).collect();
    assert_eq!(names, vec!["a"]);
    assert_close(profile.total_weight(), 1.0);
    assert_close(node(profile, &["a"]).self_weight, 1.0);
}

#[test]
fn untimed_record_does_not_pick_the_metric() {
    let text = "foo 1 1000: cache-misses:\n\t1 a (/x)\n\n\
                foo 1 1.000000: cycles:\n\t1 a (/x)\n\n\
                foo 1 2.000000: cycles:\n\t1 a (/x)\n";
    let group = import(text);
    assert_eq!(group.profiles.len(), 1);
    assert_close(group.profiles[0].total_weight(), 1.0);
    assert_close(node(&group.profiles[0], &["a"]).self_weight, 1.0);
}

#[test]
fn stray_whitespace_line_keeps_the_stack_whole() {
    let text = "app 1 1.000000: cycles:\n\t1 leaf (/x)\n   \n\t2 root (/x)\n\n\
                app 1 2.000000: cycles:\n\t1 leaf (/x)\n\t2 root (/x)\n";
    let profile = &import(text).profiles[0];
    assert_eq!(profile.tree().len(), 3);
    assert_close(node(profile, &["root", "leaf"]).self_weight, 1.0);
}

#[test]
fn offset_suffix_is_stripped() {
    let text = "swapper 0 5.000000: cycles:\n\tffffffff8100 cpu_startup_entry+0x800047c022ec ([kernel.kallsyms])\n";
    let group = import(text);
    let profile = &group.profiles[0];
    let frame = node(profile, &["cpu_startup_entry"])
        .frame
        .clone()
        .unwrap_or_else(|| panic!("node has a frame"));
    assert_eq!(frame.name, "cpu_startup_entry");
    assert_eq!(frame.file.as_deref(), Some("[kernel.kallsyms]"));
    assert_eq!(frame.address, Some(0xffff_ffff_8100));
}

#[test]
fn each_thread_gets_a_profile() {
    let text = "app 10 1.000000: cycles:\n\t1 main (/app)\n\n\
                app 11 1.000000: cycles:\n\t1 main (/app)\n\n\
                app 10 2.000000: cycles:\n\t1 main (/app)\n";
    let group = import(text);
    assert_eq!(group.name, "");
    assert_eq!(group.index_to_view, 0);
    let names: Vec<_> = group.profiles.iter().map(Profile::name).collect();
    assert_eq!(names, vec!["app tid: 10", "app tid: 11"]);

    // Frames are shared across every profile of one import.
    let a = node(&group.profiles[0], &["main"]).frame.clone();
    let b = node(&group.profiles[1], &["main"]).frame.clone();
    match (a, b) {
        (Some(a), Some(b)) => assert!(Arc::ptr_eq(&a, &b)),
        _ => panic!("frames missing"),
    }
}

#[test]
fn garbage_is_not_recognized() {
    assert!(!import_perf_script("").is_recognized());
    assert!(!import_perf_script("\n\n# nothing but comments\n").is_recognized());
    assert!(!import_perf_script("no header here\n\tffff sym (/x)\n").is_recognized());
}

#[test]
fn samples_going_back_in_time_are_skipped() {
    let text = "app 1 2.000000: cycles:\n\t1 a (/x)\n\n\
                app 1 1.000000: cycles:\n\t1 b (/x)\n\n\
                app 1 3.000000: cycles:\n\t1 a (/x)\n";
    let profile = &import(text).profiles[0];
    assert_close(profile.total_weight(), 1.0);
    assert_eq!(profile.tree().len(), 2);
}

#[test]
fn empty_stack_samples_keep_duration() {
    let text = "app 1 1.000000: cycles:\n\t1 a (/x)\n\n\
                app 1 1.250000: cycles:\n\n\
                app 1 2.000000: cycles:\n\t1 a (/x)\n";
    let profile = &import(text).profiles[0];
    assert_close(profile.total_weight(), 1.0);
    assert_close(node(profile, &["a"]).total_weight, 0.25);
    assert_weight_conservation(profile);
}

#[test]
fn fixture_imports_per_thread_profiles() {
    let data = include_bytes!("fixtures/perf-script-sample.txt");
    let group = import_auto(data.as_slice())
        .into_group()
        .unwrap_or_else(|| panic!("fixture should be recognized"));

    let names: Vec<_> = group.profiles.iter().map(Profile::name).collect();
    assert_eq!(
        names,
        vec!["server pid: 4100 tid: 4100", "server worker pid: 4100 tid: 4102"]
    );
    assert_eq!(group.name, "");

    let main = &group.profiles[0];
    assert_close(main.total_weight(), 0.001);
    let libc = "__libc_start_main";
    let handle = node(main, &[libc, "event_loop", "handle_request"]);
    assert_close(handle.total_weight, 0.001);
    assert_close(handle.self_weight, 0.000_75);
    let parse = node(main, &[libc, "event_loop", "handle_request", "parse_headers"]);
    assert_close(parse.self_weight, 0.000_25);
    assert_close(node(main, &[libc, "event_loop"]).self_weight, 0.0);
    // The page-faults record never reaches the tree.
    let mut names = Vec::new();
    main.walk(|n, _| names.push(n.name().to_string()));
    assert!(!names.iter().any(|n| n == "memcpy_avx"));
    assert_weight_conservation(main);

    let worker = &group.profiles[1];
    let unknown = "??? (/usr/lib/x86_64-linux-gnu/libc.so.6)";
    let compress = node(worker, &[unknown, "worker_main", "compress_block"]);
    assert_close(compress.self_weight, 0.0005);
    assert_eq!(worker.tree().len(), 4);
    assert_weight_conservation(worker);
}

#[test]
fn source_lines_refine_frames() {
    let text = "app 1 1.000000: cycles:\n\
                \t10 helper (/app)\n\
                \t  util.h:12 (inlined)\n\
                \t20 main (/app)\n\
                \t  main.c:40\n\n\
                app 1 2.000000: cycles:\n\
                \t10 helper (/app)\n\
                \t  util.h:12 (inlined)\n\
                \t20 main (/app)\n\
                \t  main.c:41\n";
    let profile = &import(text).profiles[0];

    // Different call-site lines make different frames for `main`.
    let roots: Vec<_> = profile
        .tree()
        .root()
        .children
        .iter()
        .filter_map(|&id| profile.tree().node(id))
        .filter_map(|n| n.frame.as_ref().map(|f| (f.name.clone(), f.file.clone(), f.line)))
        .collect();
    assert_eq!(
        roots,
        vec![
            ("main".to_string(), Some("main.c".to_string()), Some(40)),
            ("main".to_string(), Some("main.c".to_string()), Some(41)),
        ]
    );
}
