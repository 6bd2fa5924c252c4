//! Integration tests for the backlight endpoint on a booted board

use nspire_backlight::{BacklightEndpoint, ParseError, ENDPOINT_NAME};
use nspire_board::mock::{MockPlatform, MockRegisters};
use nspire_board::resources::CONTRAST_LEVEL;
use nspire_board::{bring_up, BoardConfig, BoardRevision};

#[test]
fn test_endpoint_binds_to_mapped_apb_window() {
    let config = BoardConfig::new(BoardRevision::Cx).unwrap();
    let mut platform = MockPlatform::new();
    let board = bring_up(&config, platform.platform()).unwrap();

    // Construction only computes the register window; nothing is accessed.
    let endpoint = unsafe { BacklightEndpoint::from_mapped(&board.mapped) };
    assert!(endpoint.is_ok());
}

#[test]
fn test_shell_session() {
    let contrast = MockRegisters::new().with(CONTRAST_LEVEL, 120);
    let endpoint = BacklightEndpoint::new(&contrast);
    assert_eq!(endpoint.name(), ENDPOINT_NAME);

    let mut buf = [0u8; 64];
    let n = endpoint.read(0, &mut buf);
    assert_eq!(&buf[..n], b"Screen backlight is 120.\n");

    // echo 200 > /proc/backlight
    assert_eq!(endpoint.write(b"200\n"), Ok(4));
    let n = endpoint.read(0, &mut buf);
    assert_eq!(&buf[..n], b"Screen backlight is 200.\n");

    // echo 999 > /proc/backlight
    assert!(matches!(endpoint.write(b"999\n"), Err(ParseError::Invalid(_))));
    assert!(matches!(endpoint.write(b"abc"), Err(ParseError::Invalid(_))));
    assert_eq!(endpoint.value(), 200);
    assert_eq!(contrast.writes(), vec![(CONTRAST_LEVEL, 200)]);
}
