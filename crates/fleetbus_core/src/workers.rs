/*
    fleetbus
    A control and telemetry gateway for Modbus/TCP VFD fleets.

    Copyright (c) 2026 fleetbus contributors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    workers.rs

    The one concurrency primitive both the Polling Engine and the Command
    Dispatcher fan out on: a scoped-thread pool gated by a token channel
    acting as a counting semaphore. `crossbeam-channel`'s bounded channel
    is the semaphore; `std::thread::scope` gives every task a borrow of
    the surrounding stack frame instead of requiring `Arc` everywhere.
*/

/// Runs `f` once per item, joining before returning. When `width` is
/// `Some(n)`, at most `n` invocations of `f` run concurrently; `None`
/// means fully unbounded (one thread per item), used by the Command
/// Dispatcher which fans out to at most a handful of target drives.
pub fn run_fanout<'scope, T, R, F>(items: &'scope [T], width: Option<usize>, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&'scope T) -> R + Sync,
{
    let tokens = width.map(|w| {
        let (tx, rx) = crossbeam_channel::bounded::<()>(w);
        for _ in 0..w {
            tx.send(()).expect("bounded channel just created");
        }
        (tx, rx)
    });

    std::thread::scope(|scope| {
        let handles: Vec<_> = items
            .iter()
            .map(|item| {
                let tokens = tokens.clone();
                scope.spawn(move || {
                    let _permit = tokens.as_ref().map(|(_, rx)| rx.recv().expect("token sender outlives this thread"));
                    let result = f(item);
                    if let Some((tx, _)) = &tokens {
                        tx.send(()).expect("bounded channel has room for the permit we took");
                    }
                    result
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("worker thread panicked")).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn bounded_width_caps_concurrency() {
        let items: Vec<u32> = (0..20).collect();
        let concurrent = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);

        let results = run_fanout(&items, Some(4), |_| {
            let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            concurrent.fetch_sub(1, Ordering::SeqCst);
            now
        });

        assert_eq!(results.len(), 20);
        assert!(max_seen.load(Ordering::SeqCst) <= 4);
    }

    #[test]
    fn unbounded_runs_everything() {
        let items = vec![1, 2, 3];
        let results = run_fanout(&items, None, |x| x * 2);
        assert_eq!(results, vec![2, 4, 6]);
    }
}
