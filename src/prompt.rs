use crate::search::SearchHit;

const DEFAULT_SYSTEM: &str = include_str!("../prompts/system.txt");
const DEFAULT_HUMAN: &str = include_str!("../prompts/human.txt");

/// Instruction text sent to the model. Placeholders use `{{name}}` and are
/// filled by [`PromptTemplates::render`]; unknown names are left as written.
#[derive(Clone, Debug)]
pub struct PromptTemplates {
  pub system: String,
  pub human: String,
}

impl Default for PromptTemplates {
  fn default() -> Self {
    Self {
      system: DEFAULT_SYSTEM.to_string(),
      human: DEFAULT_HUMAN.to_string(),
    }
  }
}

#[derive(Debug, PartialEq, Eq)]
pub struct RenderedPrompt {
  pub system: String,
  pub human: String,
}

pub struct PromptVars<'a> {
  pub latest_message: &'a str,
  pub argument: &'a str,
  pub search_results: &'a [SearchHit],
}

impl PromptTemplates {
  pub fn render(&self, vars: &PromptVars<'_>) -> RenderedPrompt {
    let search_json = serde_json::to_string(vars.search_results).unwrap_or_else(|_| "[]".to_string());
    let lookup = |name: &str| match name {
      "latest_message" => Some(vars.latest_message),
      "argument" => Some(vars.argument),
      "search_results" => Some(search_json.as_str()),
      _ => None,
    };
    RenderedPrompt {
      system: substitute(&self.system, &lookup),
      human: substitute(&self.human, &lookup),
    }
  }
}

// Single pass, so placeholder-looking text inside substituted values stays literal.
fn substitute<'v, F>(template: &str, lookup: &F) -> String
where
  F: Fn(&str) -> Option<&'v str>,
{
  let mut out = String::with_capacity(template.len());
  let mut rest = template;
  while let Some(start) = rest.find("{{") {
    out.push_str(&rest[..start]);
    let after = &rest[start + 2..];
    match after.find("}}") {
      Some(end) => {
        let name = after[..end].trim();
        match lookup(name) {
          Some(value) => out.push_str(value),
          None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
      }
      None => {
        out.push_str(&rest[start..]);
        rest = "";
      }
    }
  }
  out.push_str(rest);
  out
}
