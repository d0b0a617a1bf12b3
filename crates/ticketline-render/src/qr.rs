// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR block drawn with full-block characters.

use qrcode::{EcLevel, QrCode};
use ticketline_core::error::{Result, TicketlineError};

/// Dark module: two full blocks so modules come out roughly square.
const DARK: &str = "\u{2588}\u{2588}";
const LIGHT: &str = "  ";

/// Quiet-zone width in modules on every side.
const QUIET_ZONE: usize = 2;

/// Encode `data` and return one string per module row, quiet zone included.
///
/// Empty content still encodes to a minimal version 1 symbol.
pub fn qr_rows(data: &str) -> Result<Vec<String>> {
    let code = QrCode::with_error_correction_level(data, EcLevel::L)
        .map_err(|e| TicketlineError::Render(format!("QR code generation failed: {e}")))?;

    let width = code.width();
    let full = width + QUIET_ZONE * 2;
    let blank = LIGHT.repeat(full);

    let mut rows = Vec::with_capacity(full);
    rows.extend(std::iter::repeat_n(blank.clone(), QUIET_ZONE));
    for y in 0..width {
        let mut row = LIGHT.repeat(QUIET_ZONE);
        for x in 0..width {
            let is_dark = code[(x, y)] == qrcode::Color::Dark;
            row.push_str(if is_dark { DARK } else { LIGHT });
        }
        row.push_str(&LIGHT.repeat(QUIET_ZONE));
        rows.push(row);
    }
    rows.extend(std::iter::repeat_n(blank, QUIET_ZONE));
    Ok(rows)
}
