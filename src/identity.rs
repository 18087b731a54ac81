//! Change-identity & state (C7).
//!
//! Computes the stable per-migration hash used by destinations that
//! maintain pending reviews (PR/Gerrit change) to find and update the
//! same destination object across runs, and discovers `last_rev` by
//! scanning destination commits for a revision-id label.

use sha2::{Digest, Sha256};

use crate::change::Change;

/// Fields substitutable into a `change_identity_template`
/// (`${copybara_config_path}`, `${copybara_workflow_name}`,
/// `${copybara_reference}`, `${label:NAME}`, current username).
#[derive(Debug, Clone, Copy)]
pub struct IdentityContext<'a> {
   pub config_path:    &'a str,
   pub workflow_name:  &'a str,
   pub reference:      &'a str,
   pub extra_labels:   &'a [(String, String)],
   pub invoking_user:  &'a str,
}

/// Render a `change_identity_template` against an [`IdentityContext`],
/// substituting `${...}` placeholders. Unresolvable `${label:NAME}`
/// placeholders substitute the empty string (absence of a label is not a
/// config error here — the template author is responsible for ensuring
/// the label exists when it matters).
pub fn render_identity_template(template: &str, ctx: &IdentityContext<'_>) -> String {
   let mut out = String::with_capacity(template.len());
   let mut rest = template;

   while let Some(start) = rest.find("${") {
      out.push_str(&rest[..start]);
      let after = &rest[start + 2..];
      let Some(end) = after.find('}') else {
         out.push_str(&rest[start..]);
         break;
      };
      let key = &after[..end];
      out.push_str(&resolve_placeholder(key, ctx));
      rest = &after[end + 1..];
   }
   out.push_str(rest);
   out
}

fn resolve_placeholder(key: &str, ctx: &IdentityContext<'_>) -> String {
   match key {
      "copybara_config_path" => ctx.config_path.to_string(),
      "copybara_workflow_name" => ctx.workflow_name.to_string(),
      "copybara_reference" => ctx.reference.to_string(),
      _ if key.starts_with("label:") => {
         let name = &key["label:".len()..];
         ctx
            .extra_labels
            .iter()
            .find(|(k, _)| k == name)
            .map_or_else(String::new, |(_, v)| v.clone())
      },
      _ => String::new(),
   }
}

/// Compute `H(format(change_identity_template))`: SHA-256 over the
/// rendered template plus the invoking user, truncated to 40 hex
/// characters — the same width as a git SHA-1, which destination
/// log-scanning code already expects to find as a label value.
pub fn compute_identity(rendered_template: &str, ctx: &IdentityContext<'_>) -> String {
   let mut hasher = Sha256::new();
   hasher.update(rendered_template.as_bytes());
   hasher.update(b"\0user=");
   hasher.update(ctx.invoking_user.as_bytes());
   let digest = hasher.finalize();
   hex_prefix(&digest, 20)
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
   bytes.iter().take(n).map(|b| format!("{b:02x}")).collect()
}

/// Scan destination commits (first-parent order, oldest-reachable-last
/// assumed already by the caller) for the most recent value of
/// `label_name`, honoring `custom_rev_id` overrides per `4.7`.
pub fn find_last_rev<'a>(
   commits_newest_first: impl IntoIterator<Item = &'a Change>,
   label_name: &str,
) -> Option<String> {
   commits_newest_first.into_iter().find_map(|change| change.label(label_name).map(str::to_string))
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn identity_is_stable_across_calls() {
      let ctx = IdentityContext {
         config_path:   "copy.bara.sky",
         workflow_name: "default",
         reference:     "main",
         extra_labels:  &[],
         invoking_user: "alice",
      };
      let rendered = render_identity_template(
         "${copybara_config_path}:${copybara_workflow_name}:${copybara_reference}",
         &ctx,
      );
      let a = compute_identity(&rendered, &ctx);
      let b = compute_identity(&rendered, &ctx);
      assert_eq!(a, b);
      assert_eq!(a.len(), 40);
   }

   #[test]
   fn identity_changes_with_reference() {
      let ctx1 = IdentityContext {
         config_path:   "copy.bara.sky",
         workflow_name: "default",
         reference:     "main",
         extra_labels:  &[],
         invoking_user: "alice",
      };
      let ctx2 = IdentityContext { reference: "release", ..ctx1.clone() };
      let r1 = render_identity_template("${copybara_reference}", &ctx1);
      let r2 = render_identity_template("${copybara_reference}", &ctx2);
      assert_ne!(compute_identity(&r1, &ctx1), compute_identity(&r2, &ctx2));
   }

   #[test]
   fn label_placeholder_resolves() {
      let labels = vec![("GERRIT_CHANGE_NUMBER".to_string(), "42".to_string())];
      let ctx = IdentityContext {
         config_path:   "c",
         workflow_name: "w",
         reference:     "r",
         extra_labels:  &labels,
         invoking_user: "bob",
      };
      assert_eq!(render_identity_template("${label:GERRIT_CHANGE_NUMBER}", &ctx), "42");
   }
}
