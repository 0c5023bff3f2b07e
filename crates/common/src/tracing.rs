// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Shared tracing initialization utilities for binaries and test harnesses

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Initialize tracing with environment-based configuration and fallback support
///
/// - Uses `RUST_LOG` environment variable when available
/// - Falls back to provided debug flag when `RUST_LOG` is not set
/// - Uses layered subscriber architecture for flexibility
pub fn init_tracing(debug_fallback: bool) -> Result<(), eyre::Report> {
    let filter = if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        env_filter
    } else {
        let level = if debug_fallback { "debug" } else { "info" };
        EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_ansi(true)
                .with_file(true)
                .with_target(false)
                .with_line_number(true)
                .with_thread_names(true)
                .with_span_events(fmt::format::FmtSpan::NONE),
        )
        .with(filter)
        .init();

    Ok(())
}
