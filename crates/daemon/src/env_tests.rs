// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
fn parses_comma_separated_luc_types() {
    assert_eq!(parse_luc_types("3,1,4"), vec![3, 1, 4]);
    assert_eq!(parse_luc_types(" 2 , 5 "), vec![2, 5]);
    assert_eq!(parse_luc_types(""), Vec::<LucType>::new());
}

#[test]
fn skips_unparsable_luc_types() {
    assert_eq!(parse_luc_types("1,x,3"), vec![1, 3]);
}

#[test]
#[serial]
fn watchdog_interval_is_half_the_window() {
    std::env::set_var("WATCHDOG_USEC", "10000000");
    let interval = watchdog_interval();
    std::env::remove_var("WATCHDOG_USEC");

    assert_eq!(interval, Some(Duration::from_secs(5)));
}

#[test]
#[serial]
fn watchdog_interval_absent_without_the_variable() {
    std::env::remove_var("WATCHDOG_USEC");
    assert_eq!(watchdog_interval(), None);

    std::env::set_var("WATCHDOG_USEC", "0");
    let interval = watchdog_interval();
    std::env::remove_var("WATCHDOG_USEC");
    assert_eq!(interval, None);
}
