use log::error;
use reqwest::{Method, StatusCode};

use super::core::ApiClient;
use crate::error::{MigratorError, Result};
use crate::types::{PageRequest, Pipeline};

impl ApiClient {
    /// Asks the source API to copy one page of a pipeline's logs to cloud storage.
    ///
    /// Returns the number of log items the API copied for that page.
    pub async fn copy_logs_page(&self, pipeline: &Pipeline, request: PageRequest) -> Result<usize> {
        let full_path = pipeline.full_repo_path();
        let mut segments = vec!["api", "copylogstocloudstorage"];
        segments.extend(full_path.split('/'));

        let mut url = self.endpoint(&segments)?;
        url.query_pairs_mut()
            .append_pair("page[number]", &request.page_number.to_string())
            .append_pair("page[size]", &request.page_size.to_string())
            .append_pair("filter[search]", request.category.as_str());

        let body = self.execute(Method::GET, url, &[StatusCode::OK]).await?;

        parse_copied_count(&body)
    }
}

fn parse_copied_count(body: &[u8]) -> Result<usize> {
    let text = String::from_utf8_lossy(body);
    text.trim().parse::<usize>().map_err(|e| {
        error!("Failed reading copied logs count from response '{text}': {e}");
        MigratorError::Parse {
            what: "copied logs count",
            body: text.to_string(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::core::tests::test_client;
    use crate::types::LogCategory;
    use mockito::Matcher;

    #[test]
    fn test_parse_copied_count() {
        assert_eq!(parse_copied_count(b"5").unwrap(), 5);
        assert_eq!(parse_copied_count(b"0\n").unwrap(), 0);
        assert!(parse_copied_count(b"five").is_err());
        assert!(parse_copied_count(b"-1").is_err());
        assert!(parse_copied_count(b"").is_err());
    }

    #[tokio::test]
    async fn test_copy_logs_page_request_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/copylogstocloudstorage/github.com/estafette/api")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page[number]".into(), "3".into()),
                Matcher::UrlEncoded("page[size]".into(), "5".into()),
                Matcher::UrlEncoded("filter[search]".into(), "releases".into()),
            ]))
            .match_header("authorization", "Bearer secret-key")
            .with_status(200)
            .with_body("4")
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url(), 1);
        let pipeline = Pipeline::new("github.com", "estafette", "api");
        let copied = client
            .copy_logs_page(
                &pipeline,
                PageRequest {
                    category: LogCategory::Releases,
                    page_number: 3,
                    page_size: 5,
                },
            )
            .await
            .unwrap();

        assert_eq!(copied, 4);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_copy_logs_page_rejects_non_integer_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/copylogstocloudstorage/github.com/estafette/api")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{\"copied\": 5}")
            .create_async()
            .await;

        let client = test_client(&server.url(), 1);
        let pipeline = Pipeline::new("github.com", "estafette", "api");
        let err = client
            .copy_logs_page(
                &pipeline,
                PageRequest {
                    category: LogCategory::Builds,
                    page_number: 1,
                    page_size: 5,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MigratorError::Parse { .. }));
    }
}
