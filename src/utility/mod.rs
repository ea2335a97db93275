// bimbatch: Parallel DGN/DWG to iModel Batch Conversion Driver
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Utility modules.
//!
//! ```text
//! encoding
//!   detect()          BOM / UTF-16 heuristic / UTF-8 / CP1252
//!   decode_text()     bytes --> UTF-8
//!   read_text_file()  issues sidecars, prior reports
//! ```

pub mod encoding;
