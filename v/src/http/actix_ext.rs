use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use super::error::HttpError;

impl ResponseError for HttpError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(HttpError::status_code(self)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(ResponseError::status_code(self)).json(self.to_body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_maps_to_403() {
        let err = HttpError::Forbidden {
            code: "forbidden_pair".to_string(),
            message: "pair not allowed".to_string(),
        };
        assert_eq!(ResponseError::status_code(&err), StatusCode::FORBIDDEN);
        assert_eq!(err.error_response().status(), StatusCode::FORBIDDEN);
    }
}
