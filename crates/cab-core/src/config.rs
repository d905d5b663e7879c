use std::{env, fs, path::Path, time::Duration};

use crate::budget::{usd_to_nanos, CostRate};
use crate::{errors::Error, Result};

const DEFAULT_GATEWAY_BASE_URL: &str = "https://ai-gateway.vercel.sh/v1";
const DEFAULT_GATEWAY_MODEL: &str = "moonshotai/kimi-k2-thinking";

const SYSTEM_PROMPT: &str = "You are a coding assistant. Answer clearly and \
concisely, and keep track of the conversation context.";

const CODE_SYSTEM_PROMPT: &str = "In /code mode, act as an expert programmer. \
Give a correct, step-by-step solution and double-check the output.";

const STUDENT_SYSTEM_PROMPT: &str = "In /student mode, explain the exercise \
like a patient tutor, making sure the student understands both the method \
and the answer.";

/// Typed configuration, loaded once at startup and immutable afterwards.
///
/// Validation failures here are fatal: the process must not start with an
/// empty key pool or a non-positive budget.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub api_keys: Vec<String>,
    pub budget_limit_nanos: u64,
    pub cost_rate: CostRate,
    pub max_concurrent_requests: usize,

    pub gateway_base_url: String,
    pub gateway_model: String,
    pub request_timeout: Duration,

    pub system_prompt: String,
    pub code_system_prompt: String,
    pub student_system_prompt: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        // Key pool: CSV list, with a single-key fallback variable.
        let mut api_keys = parse_csv(env_str("AI_GATEWAY_API_KEYS"));
        if api_keys.is_empty() {
            if let Some(single) = env_str("AI_GATEWAY_API_KEY").and_then(non_empty) {
                api_keys.push(single.trim().to_string());
            }
        }
        if api_keys.is_empty() {
            return Err(Error::Config(
                "AI_GATEWAY_API_KEYS or AI_GATEWAY_API_KEY must be set".to_string(),
            ));
        }

        let budget_usd = env_f64("TOTAL_BUDGET_USD").unwrap_or(5.0);
        let budget_limit_nanos = usd_to_nanos(budget_usd);
        if budget_limit_nanos == 0 {
            return Err(Error::Config(
                "TOTAL_BUDGET_USD must be greater than zero".to_string(),
            ));
        }

        let max_concurrent_requests = env_usize("MAX_CONCURRENT_REQUESTS").unwrap_or(8);
        if max_concurrent_requests == 0 {
            return Err(Error::Config(
                "MAX_CONCURRENT_REQUESTS must be greater than zero".to_string(),
            ));
        }

        let gateway_base_url =
            env_str("GATEWAY_BASE_URL").unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.to_string());
        let gateway_model =
            env_str("GATEWAY_MODEL").unwrap_or_else(|| DEFAULT_GATEWAY_MODEL.to_string());
        let request_timeout =
            Duration::from_millis(env_u64("REQUEST_TIMEOUT_MS").unwrap_or(120_000));

        Ok(Self {
            telegram_bot_token,
            api_keys,
            budget_limit_nanos,
            cost_rate: CostRate::default(),
            max_concurrent_requests,
            gateway_base_url,
            gateway_model,
            request_timeout,
            system_prompt: SYSTEM_PROMPT.to_string(),
            code_system_prompt: CODE_SYSTEM_PROMPT.to_string(),
            student_system_prompt: STUDENT_SYSTEM_PROMPT.to_string(),
        })
    }

    pub fn budget_limit_usd(&self) -> f64 {
        self.budget_limit_nanos as f64 / crate::budget::NANOS_PER_USD as f64
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    env_str(key).and_then(|s| s.trim().parse::<f64>().ok())
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_parsing_trims_and_drops_empties() {
        assert_eq!(
            parse_csv(Some(" a , ,b,".to_string())),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(parse_csv(None).is_empty());
    }

    #[test]
    fn non_empty_rejects_whitespace() {
        assert_eq!(non_empty("  ".to_string()), None);
        assert_eq!(non_empty("x".to_string()), Some("x".to_string()));
    }
}
