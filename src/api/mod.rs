//! HTTP API
//!
//! Read-only query endpoints plus the operational surface (liveness,
//! readiness, metrics and cache status).
//!
//! | Path                             | Answer                              |
//! |----------------------------------|-------------------------------------|
//! | `GET /api/people`                | every person                        |
//! | `GET /api/people/cpf/{cpf}`      | one person or 404                   |
//! | `GET /api/people/city/{city}`    | people in a city                    |
//! | `GET /api/people/state/{state}`  | people in a state                   |
//! | `GET /api/people/country/{name}` | people in a country                 |
//! | `GET /api/cache/status`          | active buffer and last refresh      |
//! | `GET /healthz`, `/livez`         | `ok`                                |
//! | `GET /readyz`                    | health report, 503 when unhealthy   |
//! | `GET /metrics`                   | Prometheus text exposition          |

mod routes;
mod server;

pub use routes::{handle, ApiResponse, ApiState, CacheStatus};
pub use server::{bind, serve};
