use surf::middleware::{Middleware, Next};
use surf::{Client, Request, Response, StatusCode, Url};

/// Follows `Location` headers, which the h1 client leaves to the caller.
/// Only meant for bodiless requests such as artifact downloads.
pub struct RedirectMiddleware {
    max_attempts: u8,
}

impl RedirectMiddleware {
    pub fn new(max_attempts: u8) -> Self {
        Self { max_attempts }
    }
}

#[surf::utils::async_trait]
impl Middleware for RedirectMiddleware {
    async fn handle(&self, req: Request, client: Client, next: Next<'_>) -> surf::Result<Response> {
        let mut attempts = 0;
        let mut current_req = req;

        loop {
            if attempts > self.max_attempts {
                return Err(surf::Error::from_str(
                    StatusCode::LoopDetected,
                    "Too many redirects",
                ));
            }

            let response = next.run(current_req.clone(), client.clone()).await?;
            if !response.status().is_redirection() {
                return Ok(response);
            }

            let location = match response.header("Location") {
                Some(location) => location.last().as_str().to_string(),
                None => return Ok(response),
            };

            // Relative locations are resolved against the previous request.
            let next_url = match Url::parse(&location) {
                Ok(url) => url,
                Err(_) => current_req.url().join(&location).map_err(|_| {
                    surf::Error::from_str(StatusCode::BadGateway, "Invalid redirect location")
                })?,
            };

            log::debug!("Following redirect to {}", next_url);
            current_req = Request::new(current_req.method(), next_url);
            attempts += 1;
        }
    }
}
