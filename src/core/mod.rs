/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

pub mod message;
pub mod property;
pub mod recipient;
pub mod resolver;
pub mod tags;
