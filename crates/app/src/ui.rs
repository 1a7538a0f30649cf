//! UI thread host: timers and the message loop

use crate::context::AppContext;
use crate::dialogs::NativeDialogs;
use crate::tray::TrayHandle;
use overlay::{OverlayWindow, Win32Windows};
use std::cell::{Cell, RefCell};
use std::time::Duration;
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, KillTimer, PostQuitMessage, SetTimer, TranslateMessage, MSG,
};

pub type HostContext = AppContext<Win32Windows, OverlayWindow, NativeDialogs>;

thread_local! {
    static CONTEXT: RefCell<Option<HostContext>> = const { RefCell::new(None) };
    static TRACK_TIMER: Cell<usize> = const { Cell::new(0) };
    static RENDER_TIMER: Cell<usize> = const { Cell::new(0) };
    static POLL_MS: Cell<u32> = const { Cell::new(0) };
}

fn millis(period: Duration) -> u32 {
    period.as_millis().clamp(1, u32::MAX as u128) as u32
}

/// Create or re-arm a thread timer. `id` 0 creates a new one.
fn arm(id: usize, period: Duration, proc: unsafe extern "system" fn(HWND, u32, usize, u32)) -> usize {
    unsafe { SetTimer(None, id, millis(period), Some(proc)) }
}

/// Run both loops on the current thread until exit
pub fn run(ctx: HostContext, tray: TrayHandle) -> anyhow::Result<()> {
    let poll = ctx.poll_interval();
    CONTEXT.with(|slot| *slot.borrow_mut() = Some(ctx));

    let track = arm(0, poll, on_track_timer);
    let render = arm(0, Duration::from_millis(1), on_render_timer);
    if track == 0 || render == 0 {
        let error = windows::core::Error::from_win32();
        for id in [track, render].into_iter().filter(|&id| id != 0) {
            unsafe {
                let _ = KillTimer(None, id);
            }
        }
        tray.close();
        if let Some(mut ctx) = CONTEXT.with(|slot| slot.borrow_mut().take()) {
            ctx.shutdown();
        }
        anyhow::bail!("failed to create timers: {error}");
    }
    TRACK_TIMER.with(|t| t.set(track));
    RENDER_TIMER.with(|t| t.set(render));
    POLL_MS.with(|p| p.set(millis(poll)));
    tracing::info!(poll_ms = millis(poll), "tracking started");

    unsafe {
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).into() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    stop_timers();
    tray.close();
    if let Some(mut ctx) = CONTEXT.with(|slot| slot.borrow_mut().take()) {
        ctx.shutdown();
    }
    Ok(())
}

fn stop_timers() {
    for timer in [&TRACK_TIMER, &RENDER_TIMER] {
        let id = timer.with(|t| t.replace(0));
        if id != 0 {
            unsafe {
                let _ = KillTimer(None, id);
            }
        }
    }
}

fn stop() {
    stop_timers();
    unsafe { PostQuitMessage(0) };
}

unsafe extern "system" fn on_track_timer(_hwnd: HWND, _msg: u32, _id: usize, _time: u32) {
    let changed = CONTEXT.with(|slot| {
        // Busy inside a modal dialog
        let Ok(mut slot) = slot.try_borrow_mut() else {
            return false;
        };
        slot.as_mut().map(|ctx| ctx.tracker_tick()).unwrap_or(false)
    });

    // Show the new state without waiting for the next frame
    if changed {
        render();
    }
}

unsafe extern "system" fn on_render_timer(_hwnd: HWND, _msg: u32, _id: usize, _time: u32) {
    render();
}

fn render() {
    let next = CONTEXT.with(|slot| {
        let Ok(mut slot) = slot.try_borrow_mut() else {
            return None;
        };
        let ctx = slot.as_mut()?;
        let period = ctx.render_tick();
        Some((period, ctx.is_running(), ctx.poll_interval()))
    });

    match next {
        None => {}
        Some((_, false, _)) => stop(),
        Some((period, true, poll)) => {
            let render = RENDER_TIMER.with(|t| t.get());
            if render != 0 {
                arm(render, period, on_render_timer);
            }

            // Poll interval may change on reload
            if POLL_MS.with(|p| p.replace(millis(poll))) != millis(poll) {
                let track = TRACK_TIMER.with(|t| t.get());
                if track != 0 {
                    arm(track, poll, on_track_timer);
                    tracing::debug!(poll_ms = millis(poll), "poll interval changed");
                }
            }
        }
    }
}
