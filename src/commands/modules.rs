//! `armsync modules` and `armsync show`

use anyhow::Result;
use armkit::Catalog;
use colored::Colorize;
use declarative::{ArgSpec, Comparison, ModuleDefinition, UpdateStyle};

use crate::ui;

pub fn list() -> Result<()> {
    let catalog = Catalog::builtin()?;
    ui::header("Resource modules");
    for module in catalog.iter() {
        println!(
            "  {:<20} {:<22} {}",
            module.name.bold(),
            module.kind,
            module.api_version.dimmed()
        );
    }
    Ok(())
}

pub fn show(name: &str) -> Result<()> {
    let catalog = Catalog::builtin()?;
    let module = catalog.get(name)?;

    ui::header(&format!("{} ({})", module.name, module.kind));
    ui::kv("api version", &module.api_version);
    ui::kv("id", module.id_template.pattern());
    ui::kv("identity", &module.identity_fields().join(", "));
    ui::kv(
        "update",
        match module.update_style {
            UpdateStyle::Put => "PUT (full document)",
            UpdateStyle::Patch => "PATCH (desired fields only)",
        },
    );

    println!();
    println!("{}", "Arguments".cyan().bold());
    println!("  {:<28} {}", "state".bold(), "present | absent (default: present)".dimmed());
    println!("  {:<28} {}", "etag".bold(), "str, forwarded as If-Match".dimmed());
    for line in argument_lines(&module.arguments, 0) {
        println!("  {line}");
    }

    print_rules(module);

    let modifiers: Vec<_> = module.modifiers.iter().collect();
    if !modifiers.is_empty() {
        println!();
        println!("{}", "Comparison".cyan().bold());
        for (path, modifier) in modifiers {
            let mode = match modifier.comparison {
                Comparison::Default => "exact",
                Comparison::Ignore => "ignored",
                Comparison::CaseInsensitive => "case-insensitive",
                Comparison::Location => "location",
            };
            let fixed = if modifier.updatable { "" } else { ", fixed at creation" };
            println!("  {path:<40} {}", format!("{mode}{fixed}").dimmed());
        }
    }

    if !module.outputs.is_empty() {
        println!();
        println!("{}", "Outputs".cyan().bold());
        for output in &module.outputs {
            println!("  {:<28} {}", output.key(), output.pointer.dimmed());
        }
    }
    Ok(())
}

fn print_rules(module: &ModuleDefinition) {
    if module.rules.is_empty() {
        return;
    }
    println!();
    println!("{}", "Rules".cyan().bold());
    for rule in module.rules.rules() {
        let path = if rule.path.is_root() {
            "(document)".to_string()
        } else {
            rule.path.to_string()
        };
        println!("  {path:<40} {}", rule.op.to_string().dimmed());
    }
}

/// One line per argument, nested options indented
fn argument_lines(specs: &[ArgSpec], depth: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for spec in specs {
        let mut detail = match spec.elements {
            Some(elements) => format!("list of {elements}"),
            None => spec.kind.to_string(),
        };
        if spec.required {
            detail.push_str(", required");
        }
        if !spec.choices.is_empty() {
            detail.push_str(&format!(", one of: {}", spec.choices.join(" | ")));
        }
        let name = format!("{}{}", "  ".repeat(depth), spec.name);
        lines.push(format!("{name:<28} {detail}"));
        lines.extend(argument_lines(&spec.options, depth + 1));
    }
    lines
}
