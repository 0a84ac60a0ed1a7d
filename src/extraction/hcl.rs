//! Resource mention scanning inside configuration templates
//!
//! Templates are Go string literals holding HCL. We only need to know which
//! resource types they name, so a line-oriented regex scan is enough.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{MentionStyle, ResourceMention};

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(resource|data)\s+"([A-Za-z][A-Za-z0-9_]*)"\s+""#).expect("valid regex")
});

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w.])(?:data\.)?([a-z][a-z0-9]*(?:_[a-z0-9]+)+)\.[A-Za-z_][A-Za-z0-9_-]*")
        .expect("valid regex")
});

static RESOURCE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:_[a-z0-9]+)+$").expect("valid regex"));

const MAX_CONTEXT_LEN: usize = 200;

/// Whether a string looks like a provider resource type (`azurerm_resource_group`)
pub fn is_resource_name(s: &str) -> bool {
    RESOURCE_NAME_RE.is_match(s)
}

/// Scan template text starting at `first_line` for resource mentions
pub fn scan_mentions(text: &str, first_line: u32) -> Vec<ResourceMention> {
    let mut mentions = Vec::new();
    let mut seen: HashSet<(String, MentionStyle, u32)> = HashSet::new();

    for (offset, raw_line) in text.lines().enumerate() {
        let line = first_line + offset as u32;
        let context = truncate_context(raw_line.trim());

        if let Some(caps) = BLOCK_RE.captures(raw_line) {
            let style = if &caps[1] == "data" {
                MentionStyle::DataSourceBlock
            } else {
                MentionStyle::ResourceBlock
            };
            let resource = caps[2].to_string();
            if seen.insert((resource.clone(), style, line)) {
                mentions.push(ResourceMention {
                    resource,
                    style,
                    line,
                    context: context.clone(),
                });
            }
            // The block header names its type only once
            continue;
        }

        for caps in ATTRIBUTE_RE.captures_iter(raw_line) {
            let resource = caps[1].to_string();
            if seen.insert((resource.clone(), MentionStyle::Attribute, line)) {
                mentions.push(ResourceMention {
                    resource,
                    style: MentionStyle::Attribute,
                    line,
                    context: context.clone(),
                });
            }
        }
    }

    mentions
}

fn truncate_context(line: &str) -> String {
    if line.len() <= MAX_CONTEXT_LEN {
        return line.to_string();
    }
    let mut end = MAX_CONTEXT_LEN;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &line[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_and_data_blocks() {
        let text = r#"
resource "azurerm_resource_group" "test" {
  name = "acctest"
}

data "azurerm_client_config" "current" {}
"#;
        let mentions = scan_mentions(text, 10);
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].resource, "azurerm_resource_group");
        assert_eq!(mentions[0].style, MentionStyle::ResourceBlock);
        assert_eq!(mentions[0].line, 11);
        assert_eq!(mentions[1].resource, "azurerm_client_config");
        assert_eq!(mentions[1].style, MentionStyle::DataSourceBlock);
        assert_eq!(mentions[1].line, 15);
    }

    #[test]
    fn test_attribute_references() {
        let text = r#"  resource_group_name = azurerm_resource_group.test.name
  tenant_id           = data.azurerm_client_config.current.tenant_id
  depends_on          = [azurerm_virtual_network.test]"#;
        let mentions = scan_mentions(text, 1);
        let names: Vec<&str> = mentions.iter().map(|m| m.resource.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "azurerm_resource_group",
                "azurerm_client_config",
                "azurerm_virtual_network"
            ]
        );
        assert!(mentions.iter().all(|m| m.style == MentionStyle::Attribute));
        assert_eq!(mentions[2].line, 3);
    }

    #[test]
    fn test_ignores_locals_and_variables() {
        let text = "name = var.some_name.value\nother = local.my_local.id\nx = module.mod_a.out";
        assert!(scan_mentions(text, 1).is_empty());
    }

    #[test]
    fn test_context_is_trimmed_line() {
        let mentions = scan_mentions("    id = azurerm_subnet.test.id   ", 3);
        assert_eq!(mentions[0].context, "id = azurerm_subnet.test.id");
    }

    #[test]
    fn test_duplicate_mentions_on_one_line_collapse() {
        let mentions = scan_mentions("a = azurerm_subnet.a.id, azurerm_subnet.b.id", 1);
        assert_eq!(mentions.len(), 1);
    }

    #[test]
    fn test_is_resource_name() {
        assert!(is_resource_name("azurerm_resource_group"));
        assert!(!is_resource_name("azurerm"));
        assert!(!is_resource_name("Azurerm_thing"));
        assert!(!is_resource_name("azurerm_thing.test"));
    }
}
