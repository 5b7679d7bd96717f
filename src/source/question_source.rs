use super::base::SourceBase;
use super::{DataSource, SourceSchema};
use crate::config::MetabaseConfig;
use crate::metabase::error::Result;
use crate::metabase::SessionClient;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arguments needed to reopen a saved-question source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionArgs {
    pub question: i64,
}

/// Source backed by a Metabase saved question
pub struct QuestionSource {
    base: SourceBase,
    args: QuestionArgs,
}

impl QuestionSource {
    pub fn new(config: &MetabaseConfig, args: QuestionArgs) -> Result<Self> {
        Ok(Self::with_client(SessionClient::new(config)?, args))
    }

    pub fn with_client(client: SessionClient, args: QuestionArgs) -> Self {
        let mut base = SourceBase::with_client(client);
        base.metadata
            .insert("question".to_string(), Value::from(args.question));
        QuestionSource { base, args }
    }

    pub fn args(&self) -> &QuestionArgs {
        &self.args
    }
}

impl DataSource for QuestionSource {
    fn driver(&self) -> &'static str {
        "metabase_question"
    }

    fn is_loaded(&self) -> bool {
        self.base.is_loaded()
    }

    fn schema(&mut self) -> Result<SourceSchema> {
        let question = self.args.question;
        self.base
            .schema_with(&format!("question {}", question), |api| {
                api.fetch_question(question)
            })
    }

    fn read(&mut self) -> Result<&DataFrame> {
        let question = self.args.question;
        self.base
            .load_with(&format!("question {}", question), |api| {
                api.fetch_question(question)
            })
    }

    fn close(&mut self) {
        self.base.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metabase::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_question_read_once_with_login() {
        let mut server = mockito::Server::new();
        let login = server
            .mock("POST", "/api/session")
            .with_status(200)
            .with_body(r#"{"id": "tok-q"}"#)
            .expect(1)
            .create();
        let metadata = server
            .mock("GET", "/api/table/card__5/query_metadata")
            .match_header("x-metabase-session", "tok-q")
            .with_status(200)
            .with_body(
                json!({"fields": [
                    {"display_name": "Month", "name": "month", "base_type": "type/DateTime"}
                ]})
                .to_string(),
            )
            .expect(1)
            .create();
        let export = server
            .mock("POST", "/api/card/5/query/csv")
            .match_header("x-metabase-session", "tok-q")
            .with_status(200)
            .with_header("content-type", "text/csv; charset=utf-8")
            .with_body("Month,Count\n2024-01-01T00:00:00,10\n2024-02-01T00:00:00,12\n")
            .expect(1)
            .create();

        let config = MetabaseConfig::with_password(server.url(), "ada", "pw");
        let mut src = QuestionSource::new(&config, QuestionArgs { question: 5 }).unwrap();

        let schema = src.schema().unwrap();
        assert_eq!(schema.columns, 2);
        assert!(schema.dtypes[0].1.is_temporal());
        assert_eq!(src.read().unwrap().height(), 2);

        login.assert();
        metadata.assert();
        export.assert();
    }

    #[test]
    fn test_expired_session_relogs_before_fetch() {
        let mut server = mockito::Server::new();
        let login = server
            .mock("POST", "/api/session")
            .with_status(200)
            .with_body(r#"{"id": "tok-q"}"#)
            .expect(2)
            .create();
        let _metadata = server
            .mock("GET", "/api/table/card__5/query_metadata")
            .with_status(200)
            .with_body(r#"{"fields": []}"#)
            .create();
        let _export = server
            .mock("POST", "/api/card/5/query/csv")
            .with_status(200)
            .with_body("a\n1\n")
            .create();

        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let config = MetabaseConfig::with_password(server.url(), "ada", "pw");
        let client = SessionClient::new(&config)
            .unwrap()
            .with_clock(clock.clone());
        let mut src = QuestionSource::with_client(client, QuestionArgs { question: 5 });

        src.read().unwrap();
        src.close();
        clock.advance(Duration::days(11));
        src.read().unwrap();

        login.assert();
    }
}
