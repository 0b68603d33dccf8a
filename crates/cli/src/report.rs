use std::io::{self, Write};

use flame_cat_core::model::{Profile, ProfileGroup};

/// Write every profile of the group as an indented call tree.
pub fn write_group<W: Write>(out: &mut W, group: &ProfileGroup) -> io::Result<()> {
    if !group.name.is_empty() {
        writeln!(out, "{}", group.name)?;
    }
    for (index, profile) in group.profiles.iter().enumerate() {
        let marker = if index == group.index_to_view { "*" } else { " " };
        writeln!(
            out,
            "{marker} {} ({})",
            display_name(profile),
            profile.format_value(profile.total_weight())
        )?;
        write_tree(out, profile)?;
    }
    Ok(())
}

fn display_name(profile: &Profile) -> &str {
    match profile.name() {
        "" => "(unnamed)",
        name => name,
    }
}

/// One line per node: total, self, then the frame name indented by depth.
fn write_tree<W: Write>(out: &mut W, profile: &Profile) -> io::Result<()> {
    let mut result = Ok(());
    profile.walk(|node, depth| {
        if result.is_err() {
            return;
        }
        result = writeln!(
            out,
            "  {:>10} {:>10}  {:indent$}{}",
            profile.format_value(node.total_weight),
            profile.format_value(node.self_weight),
            "",
            node.name(),
            indent = depth * 2
        );
    });
    result
}
