//! Streaming results: chaining, the one-open-stream rule and clobbering.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use zero_mysql_resultset::Opts;
use zero_mysql_resultset::constant::ColumnType;
use zero_mysql_resultset::error::Error;
use zero_mysql_resultset::protocol::row::RowView;
use zero_mysql_resultset::resultset::ResultSetRows;

fn cols() -> [Col<'static>; 1] {
    [Col::new("n", ColumnType::MYSQL_TYPE_LONG).length(11)]
}

fn rows(script: &mut Script, values: &[&str], status: u16) {
    script.result_header(&cols(), false);
    for value in values {
        script.text_row(&[Some(value)]);
    }
    script.eof(status);
}

#[test]
fn test_streaming_chain_of_two_results() {
    let mut script = Script::new();
    script.response();
    rows(
        &mut script,
        &["1", "2", "3"],
        STATUS_AUTOCOMMIT | STATUS_MORE_RESULTS,
    );
    rows(&mut script, &["4", "5"], STATUS_AUTOCOMMIT);
    let (conn, _output) = connect(&mut script, session(), quiet_opts());

    let mut first = conn.query_streaming("CALL two_results()").unwrap();
    assert!(first.is_streaming());
    let source = first.rows_mut().unwrap();
    assert!(source.is_dynamic());
    let cells: Vec<_> = source
        .collect_rows()
        .unwrap()
        .iter()
        .map(|row| row.get(0).map(<[u8]>::to_vec))
        .collect();
    assert_eq!(
        cells,
        vec![Some(b"1".to_vec()), Some(b"2".to_vec()), Some(b"3".to_vec())]
    );
    let ResultSetRows::Streaming(stream) = first.rows_mut().unwrap() else {
        panic!("expected a streaming source");
    };
    assert!(stream.more_results_existed());
    assert_eq!(stream.rows_read(), 3);

    let mut second = first.take_next().unwrap().unwrap();
    assert!(second.is_streaming());
    assert_eq!(second.rows_mut().unwrap().collect_rows().unwrap().len(), 2);
    assert!(second.take_next().unwrap().is_none());
}

#[test]
fn test_streaming_blocks_other_commands() {
    let mut script = Script::new();
    script.response();
    rows(&mut script, &["1", "2", "3"], STATUS_AUTOCOMMIT);
    script.response().ok(0, 0, STATUS_AUTOCOMMIT, 0);
    let (conn, output) = connect(&mut script, session(), quiet_opts());

    let mut result = conn.query_streaming("SELECT n FROM t").unwrap();
    assert!(result.rows_mut().unwrap().next().unwrap().is_some());

    assert!(matches!(
        conn.query_drop("DO 1"),
        Err(Error::ProtocolViolation(_))
    ));
    assert_eq!(sent_queries(&output), vec!["SELECT n FROM t"]);

    // closing reads the remaining rows
    drop(result);
    conn.query_drop("DO 1").unwrap();
    assert_eq!(sent_queries(&output), vec!["SELECT n FROM t", "DO 1"]);
}

#[test]
fn test_clobber_streaming_results() {
    let mut script = Script::new();
    script.response();
    rows(&mut script, &["1", "2", "3"], STATUS_AUTOCOMMIT);
    script.response().ok(0, 0, STATUS_AUTOCOMMIT, 0);
    let opts = Opts {
        clobber_streaming_results: true,
        ..quiet_opts()
    };
    let (conn, _output) = connect(&mut script, session(), opts);

    let mut result = conn.query_streaming("SELECT n FROM t").unwrap();
    assert!(result.rows_mut().unwrap().next().unwrap().is_some());

    conn.query_drop("DO 1").unwrap();
    assert!(matches!(
        result.rows_mut().unwrap().next(),
        Err(Error::ResourceMisuse(_))
    ));
}

#[test]
fn test_read_after_exhaustion_is_misuse() {
    let mut script = Script::new();
    script.response();
    rows(&mut script, &["1"], STATUS_AUTOCOMMIT);
    let (conn, _output) = connect(&mut script, session(), quiet_opts());

    let mut result = conn.query_streaming("SELECT n FROM t").unwrap();
    let source = result.rows_mut().unwrap();
    assert!(source.next().unwrap().is_some());
    assert!(source.next().unwrap().is_none());
    assert!(matches!(source.next(), Err(Error::ResourceMisuse(_))));
}

#[test]
fn test_failed_row_read_exhausts_source() {
    let mut script = Script::new();
    script.response().result_header(&cols(), false);
    script
        .text_row(&[Some("1")])
        .err(1317, "70100", "Query execution was interrupted")
        .response()
        .ok(0, 0, STATUS_AUTOCOMMIT, 0);
    let (conn, _output) = connect(&mut script, session(), quiet_opts());

    let mut result = conn.query_streaming("SELECT n FROM t").unwrap();
    let source = result.rows_mut().unwrap();
    assert!(source.next().unwrap().is_some());
    let err = source.next().unwrap_err();
    assert_eq!(err.vendor_code(), 1317);
    assert!(matches!(source.next(), Err(Error::ResourceMisuse(_))));

    // the failed source no longer holds the connection
    conn.query_drop("DO 1").unwrap();
}

#[test]
fn test_net_write_timeout_round_trip() {
    let mut script = Script::new();
    script.response().ok(0, 0, STATUS_AUTOCOMMIT, 0).response();
    rows(&mut script, &["1"], STATUS_AUTOCOMMIT);
    script.response().ok(0, 0, STATUS_AUTOCOMMIT, 0);
    let (conn, output) = connect(&mut script, session(), Opts::default());

    {
        let mut result = conn.query_streaming("SELECT n FROM t").unwrap();
        assert_eq!(result.rows_mut().unwrap().collect_rows().unwrap().len(), 1);
    }
    assert_eq!(
        sent_queries(&output),
        vec![
            "SET net_write_timeout=600",
            "SELECT n FROM t",
            "SET net_write_timeout=60",
        ]
    );
}

#[test]
fn test_process_next_borrows_packet() {
    let mut script = Script::new();
    script.response();
    rows(&mut script, &["10", "20"], STATUS_AUTOCOMMIT);
    let (conn, _output) = connect(&mut script, session(), quiet_opts());

    let mut result = conn.query_streaming("SELECT n FROM t").unwrap();
    let ResultSetRows::Streaming(stream) = result.rows_mut().unwrap() else {
        panic!("expected a streaming source");
    };
    let mut total = 0;
    while let Some(n) = stream
        .process_next(|row| {
            std::str::from_utf8(row.get(0).unwrap())
                .unwrap()
                .parse::<i64>()
                .unwrap()
        })
        .unwrap()
    {
        total += n;
    }
    assert_eq!(total, 30);
}

#[test]
fn test_close_after_exhaustion_closes_following_results() {
    let mut script = Script::new();
    script.response();
    rows(&mut script, &["1"], STATUS_AUTOCOMMIT | STATUS_MORE_RESULTS);
    rows(&mut script, &["2", "3"], STATUS_AUTOCOMMIT);
    script.response().ok(0, 0, STATUS_AUTOCOMMIT, 0);
    let (conn, output) = connect(&mut script, session(), quiet_opts());

    let mut result = conn.query_streaming("CALL two_results()").unwrap();
    let source = result.rows_mut().unwrap();
    assert_eq!(source.collect_rows().unwrap().len(), 1);
    source.close().unwrap();

    conn.query_drop("DO 1").unwrap();
    assert_eq!(sent_queries(&output), vec!["CALL two_results()", "DO 1"]);
}

#[test]
fn test_streaming_update_restores_net_write_timeout() {
    let mut script = Script::new();
    script
        .response()
        .ok(0, 0, STATUS_AUTOCOMMIT, 0)
        .response()
        .ok(3, 0, STATUS_AUTOCOMMIT, 0)
        .response()
        .ok(0, 0, STATUS_AUTOCOMMIT, 0)
        .response()
        .ok(0, 0, STATUS_AUTOCOMMIT, 0);
    let (conn, output) = connect(&mut script, session(), Opts::default());

    let result = conn.query_streaming("UPDATE t SET a = 1").unwrap();
    assert_eq!(result.update_result().unwrap().affected_rows, 3);
    drop(result);
    conn.query_drop("DO 1").unwrap();
    assert_eq!(
        sent_queries(&output),
        vec![
            "SET net_write_timeout=600",
            "UPDATE t SET a = 1",
            "SET net_write_timeout=60",
            "DO 1",
        ]
    );
}
