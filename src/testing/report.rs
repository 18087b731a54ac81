//! HTML report generation for fixture test results.

use std::{fs, path::Path};

use crate::error::Result;

use super::{Fixture, RunResult, TestSummary};

/// Generate an HTML report from test results.
pub fn generate_html_report(results: &[RunResult], fixtures: &[Fixture], output_path: &Path) -> Result<()> {
   let summary = TestSummary::from_results(results);
   let html = render_report(results, fixtures, &summary);
   fs::write(output_path, html)?;
   Ok(())
}

fn render_report(results: &[RunResult], fixtures: &[Fixture], summary: &TestSummary) -> String {
   let mut html = String::new();

   html.push_str(&format!(
      r#"<!DOCTYPE html>
<html lang="en">
<head>
   <meta charset="UTF-8">
   <meta name="viewport" content="width=device-width, initial-scale=1.0">
   <title>copyhaul Fixture Test Report</title>
   <style>
      :root {{
         --bg: #0d1117;
         --fg: #c9d1d9;
         --fg-muted: #8b949e;
         --border: #30363d;
         --bg-card: #161b22;
         --green: #3fb950;
         --red: #f85149;
         --yellow: #d29922;
         --blue: #58a6ff;
      }}
      * {{ box-sizing: border-box; margin: 0; padding: 0; }}
      body {{
         font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, sans-serif;
         background: var(--bg);
         color: var(--fg);
         line-height: 1.6;
         padding: 2rem;
      }}
      .container {{ max-width: 1400px; margin: 0 auto; }}
      h1 {{ margin-bottom: 1rem; font-weight: 600; }}
      .summary {{ display: flex; gap: 1rem; margin-bottom: 2rem; flex-wrap: wrap; }}
      .stat {{
         background: var(--bg-card);
         border: 1px solid var(--border);
         border-radius: 6px;
         padding: 1rem 1.5rem;
         min-width: 120px;
      }}
      .stat-value {{ font-size: 2rem; font-weight: 600; }}
      .stat-label {{ color: var(--fg-muted); font-size: 0.875rem; }}
      .stat.passed .stat-value {{ color: var(--green); }}
      .stat.failed .stat-value {{ color: var(--red); }}
      .stat.no-golden .stat-value {{ color: var(--yellow); }}
      .stat.errors .stat-value {{ color: var(--red); }}

      .fixture {{
         background: var(--bg-card);
         border: 1px solid var(--border);
         border-radius: 6px;
         margin-bottom: 1.5rem;
         overflow: hidden;
      }}
      .fixture-header {{
         padding: 1rem 1.5rem;
         border-bottom: 1px solid var(--border);
         display: flex;
         justify-content: space-between;
         align-items: center;
         cursor: pointer;
      }}
      .fixture-header:hover {{ background: rgba(255,255,255,0.03); }}
      .fixture-name {{ font-weight: 600; font-size: 1.1rem; }}
      .fixture-status {{ padding: 0.25rem 0.75rem; border-radius: 20px; font-size: 0.875rem; }}
      .fixture-status.passed {{ background: rgba(63, 185, 80, 0.15); color: var(--green); }}
      .fixture-status.failed {{ background: rgba(248, 81, 73, 0.15); color: var(--red); }}
      .fixture-status.no-golden {{ background: rgba(210, 153, 34, 0.15); color: var(--yellow); }}
      .fixture-status.error {{ background: rgba(248, 81, 73, 0.15); color: var(--red); }}

      .fixture-content {{ display: none; padding: 1.5rem; }}
      .fixture.expanded .fixture-content {{ display: block; }}

      .diff-row {{ display: flex; gap: 1rem; margin-bottom: 0.5rem; align-items: baseline; }}
      .diff-label {{ min-width: 100px; font-weight: 500; font-size: 0.875rem; }}
      .diff-value {{ flex: 1; font-family: monospace; }}
      .diff-match {{ color: var(--green); }}
      .diff-mismatch {{ color: var(--red); }}

      .file-list {{ list-style: none; font-size: 0.875rem; }}
      .file-list li {{ padding: 0.25rem 0; padding-left: 1rem; position: relative; font-family: monospace; }}
      .file-list li::before {{ content: "•"; position: absolute; left: 0; color: var(--fg-muted); }}

      .error-message {{
         background: rgba(248, 81, 73, 0.1);
         border: 1px solid var(--red);
         color: var(--red);
         padding: 1rem;
         border-radius: 6px;
         font-family: monospace;
         font-size: 0.875rem;
      }}

      .timestamp {{ color: var(--fg-muted); font-size: 0.875rem; margin-bottom: 1rem; }}
   </style>
</head>
<body>
   <div class="container">
      <h1>copyhaul Fixture Test Report</h1>
      <p class="timestamp">Generated: {}</p>

      <div class="summary">
         <div class="stat">
            <div class="stat-value">{}</div>
            <div class="stat-label">Total</div>
         </div>
         <div class="stat passed">
            <div class="stat-value">{}</div>
            <div class="stat-label">Passed</div>
         </div>
         <div class="stat failed">
            <div class="stat-value">{}</div>
            <div class="stat-label">Failed</div>
         </div>
         <div class="stat no-golden">
            <div class="stat-value">{}</div>
            <div class="stat-label">No Golden</div>
         </div>
         <div class="stat errors">
            <div class="stat-value">{}</div>
            <div class="stat-label">Errors</div>
         </div>
      </div>
"#,
      chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
      summary.total,
      summary.passed,
      summary.failed,
      summary.no_golden,
      summary.errors
   ));

   for result in results {
      let fixture = fixtures.iter().find(|f| f.name == result.name);
      html.push_str(&render_fixture_result(result, fixture));
   }

   html.push_str(
      r"
   </div>
   <script>
      document.querySelectorAll('.fixture-header').forEach(header => {
         header.addEventListener('click', () => {
            header.parentElement.classList.toggle('expanded');
         });
      });
      document.querySelectorAll('.fixture.failed, .fixture.error').forEach(f => {
         f.classList.add('expanded');
      });
   </script>
</body>
</html>
",
   );

   html
}

fn render_fixture_result(result: &RunResult, fixture: Option<&Fixture>) -> String {
   let (status_class, status_text) = if result.error.is_some() {
      ("error", "Error")
   } else if let Some(ref cmp) = result.comparison {
      if cmp.passed { ("passed", "Passed") } else { ("failed", "Failed") }
   } else {
      ("no-golden", "No Golden")
   };

   let mut html = format!(
      r#"
      <div class="fixture {}">
         <div class="fixture-header">
            <span class="fixture-name">{}</span>
            <span class="fixture-status {}">{}</span>
         </div>
         <div class="fixture-content">
"#,
      status_class, result.name, status_class, status_text
   );

   if let Some(ref err) = result.error {
      html.push_str(&format!(r#"<div class="error-message">{}</div>"#, html_escape(err)));
      html.push_str("</div></div>\n");
      return html;
   }

   if let Some(ref cmp) = result.comparison {
      html.push_str(&render_comparison(cmp, result));
   } else {
      html.push_str(&render_actual_only(result));
   }
   let _ = fixture;

   html.push_str("</div></div>\n");
   html
}

fn render_comparison(cmp: &super::CompareResult, result: &RunResult) -> String {
   let mut html = String::new();

   let effects_class = if cmp.effects_match { "diff-match" } else { "diff-mismatch" };
   html.push_str(&format!(
      r#"<div class="diff-row"><span class="diff-label">Effects:</span><span class="diff-value {}">{} recorded</span></div>"#,
      effects_class,
      result.effects.len()
   ));

   if cmp.file_diffs.is_empty() {
      html.push_str(
         r#"<div class="diff-row"><span class="diff-label">Destination:</span><span class="diff-value diff-match">matches golden</span></div>"#,
      );
   } else {
      html.push_str(r#"<div class="diff-row"><span class="diff-label">Destination:</span></div><ul class="file-list">"#);
      for diff in &cmp.file_diffs {
         html.push_str(&format!("<li class=\"diff-mismatch\">{}</li>", html_escape(diff)));
      }
      html.push_str("</ul>");
   }

   html
}

fn render_actual_only(result: &RunResult) -> String {
   let mut html = format!(
      r#"<div class="diff-row"><span class="diff-label">Effects:</span><span class="diff-value">{} recorded</span></div>"#,
      result.effects.len()
   );
   html.push_str("<ul class=\"file-list\">");
   for effect in &result.effects {
      html.push_str(&format!("<li>{}: {}</li>", html_escape(&effect.effect_type), html_escape(&effect.summary)));
   }
   html.push_str("</ul>");
   html
}

fn html_escape(s: &str) -> String {
   s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
