//! Reference driver for the fd-compatibility layer: initializes logging,
//! lets `fdio-api`'s lazy startup bind stdio, and exercises the POSIX
//! surface against the in-memory reference transports.

use fdio_api::{posix, PROCESS};

fn main() {
    env_logger::init();

    log::info!("fdio-demo starting, cwd = {}", PROCESS.cwd.path());

    let fd = posix::sys_open("/hello.txt", libc::O_CREAT | libc::O_RDWR, 0o644);
    if fd < 0 {
        log::error!("open failed, errno = {}", fdio_core::status::errno());
        std::process::exit(1);
    }

    let message = b"hello from fdio-demo\n";
    let written = posix::sys_write(fd as i32, message);
    log::info!("wrote {written} bytes to fd {fd}");

    posix::sys_lseek(fd as i32, 0, libc::SEEK_SET);
    let mut buf = [0u8; 64];
    let read = posix::sys_read(fd as i32, &mut buf);
    if read > 0 {
        log::info!("read back: {:?}", String::from_utf8_lossy(&buf[..read as usize]));
    }

    posix::sys_close(fd as i32);

    fdio_api::startup::teardown(&PROCESS);
}
