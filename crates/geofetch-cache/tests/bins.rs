use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use geofetch_cache::{Cache, CacheRecord, FileCache, Headers, MemCache};

fn exercise(cache: &dyn Cache) {
    let headers = Headers::new()
        .with("Content-Type", "image/png")
        .with("Cache-Control", "max-age=60");

    assert!(cache.read("http://tiles.example.com/0/0/0.png").unwrap().is_none());

    cache
        .write("http://tiles.example.com/0/0/0.png", b"\x89PNG", &headers)
        .unwrap();
    let record = cache.read("http://tiles.example.com/0/0/0.png").unwrap().unwrap();
    assert_eq!(&record.data[..], b"\x89PNG");
    assert_eq!(record.headers, headers);

    thread::sleep(Duration::from_millis(5));
    assert!(cache.touch("http://tiles.example.com/0/0/0.png").unwrap());
    let touched = cache.read("http://tiles.example.com/0/0/0.png").unwrap().unwrap();
    assert!(touched.last_modified > record.last_modified);
    assert_eq!(touched.data, record.data);

    assert!(cache.remove("http://tiles.example.com/0/0/0.png").unwrap());
    assert!(!cache.remove("http://tiles.example.com/0/0/0.png").unwrap());
    assert!(!cache.touch("http://tiles.example.com/0/0/0.png").unwrap());
}

#[test]
fn memory_bin_contract() {
    exercise(&MemCache::default());
}

#[test]
fn file_bin_contract() {
    let dir = tempfile::tempdir().unwrap();
    exercise(&FileCache::open(dir.path().join("bin")).unwrap());
}

#[test]
fn file_bin_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let cache = FileCache::open(dir.path()).unwrap();
        cache
            .write("key", b"persisted", &Headers::new().with("ETag", "\"v1\""))
            .unwrap();
    }

    let reopened = FileCache::open(dir.path()).unwrap();
    let record = reopened.read("key").unwrap().unwrap();
    assert_eq!(&record.data[..], b"persisted");
    assert_eq!(record.headers.get("etag"), Some("\"v1\""));
}

/// Body bytes and the `x-writer` header both name the writer.
fn assert_single_write(record: &CacheRecord) {
    assert_eq!(record.data.len(), 64);
    let writer = record.data[0];
    assert!(record.data.iter().all(|&b| b == writer));
    assert_eq!(record.headers.get("x-writer"), Some(writer.to_string().as_str()));
}

fn hammer(cache: Arc<dyn Cache>, touchers: usize) {
    cache
        .write("shared", &[0; 64], &Headers::new().with("x-writer", "0"))
        .unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (1..=4u8)
        .map(|n| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let headers = Headers::new().with("x-writer", n.to_string());
                for _ in 0..200 {
                    cache.write("shared", &[n; 64], &headers).unwrap();
                }
            })
        })
        .collect();

    let touchers: Vec<_> = (0..touchers)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    assert!(cache.touch("shared").unwrap());
                }
            })
        })
        .collect();

    let reader = {
        let cache = Arc::clone(&cache);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut reads = 0;
            loop {
                let finished = done.load(Ordering::Relaxed);
                assert_single_write(&cache.read("shared").unwrap().unwrap());
                reads += 1;
                if finished {
                    return reads;
                }
            }
        })
    };

    for handle in writers {
        handle.join().unwrap();
    }
    done.store(true, Ordering::Relaxed);
    for handle in touchers {
        handle.join().unwrap();
    }
    assert!(reader.join().unwrap() > 0);

    assert_single_write(&cache.read("shared").unwrap().unwrap());
}

#[test]
fn concurrent_writers_never_mix_records() {
    let dir = tempfile::tempdir().unwrap();
    hammer(Arc::new(FileCache::open(dir.path()).unwrap()), 0);
    hammer(Arc::new(MemCache::default()), 0);
}

#[test]
fn touch_racing_write_keeps_records_whole() {
    let dir = tempfile::tempdir().unwrap();
    hammer(Arc::new(FileCache::open(dir.path()).unwrap()), 2);
    hammer(Arc::new(MemCache::default()), 2);
}

#[test]
fn touch_does_not_restore_an_older_write() {
    let dir = tempfile::tempdir().unwrap();
    let cache = FileCache::open(dir.path()).unwrap();
    cache.write("k", b"old", &Headers::new().with("ETag", "\"1\"")).unwrap();

    assert!(cache.touch("k").unwrap());
    cache.write("k", b"new", &Headers::new().with("ETag", "\"2\"")).unwrap();
    assert!(cache.touch("k").unwrap());

    let record = cache.read("k").unwrap().unwrap();
    assert_eq!(&record.data[..], b"new");
    assert_eq!(record.headers.get("etag"), Some("\"2\""));
}

#[test]
fn memory_bin_shared_across_threads() {
    let cache = Arc::new(MemCache::new(64));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..8 {
                    let key = format!("w{worker}/{i}");
                    cache.write(&key, key.as_bytes(), &Headers::new()).unwrap();
                    assert!(cache.touch(&key).unwrap());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 32);
    let record = cache.read("w3/7").unwrap().unwrap();
    assert_eq!(&record.data[..], b"w3/7");
}
