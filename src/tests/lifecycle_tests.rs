//! 生命周期测试模块
//! 测试 StableRefRegistry 的注册、安全点合并与注销流程

use crate::{ObjRef, StableRefRegistry};

fn obj(n: usize) -> ObjRef {
    ObjRef::from_raw(n as *mut ())
}

/// 测试1: 注册返回令牌并计入待发布
#[test]
fn test_register_returns_token() {
    let registry = StableRefRegistry::new();
    let mut thread = registry.attach_thread();

    let stable_ref = registry.register_stable_ref(&mut thread, obj(0x10));
    assert_eq!(thread.pending(), 1);

    // SAFETY: 引用仍然注册中，注册表仍然存活
    assert_eq!(unsafe { stable_ref.external_ref() }, obj(0x10));

    registry.unregister_stable_ref(&mut thread, stable_ref);
    assert_eq!(thread.pending(), 0);
}

/// 测试2: 安全点合并后引用对收集器可见
#[test]
fn test_process_thread_publishes_roots() {
    let registry = StableRefRegistry::new();
    let mut thread = registry.attach_thread();

    let stable_ref = registry.register_stable_ref(&mut thread, obj(0x20));

    // 合并前根集为空
    assert_eq!(registry.iter().len(), 0);

    registry.process_thread(&mut thread);
    assert_eq!(thread.pending(), 0);

    let roots = registry.iter();
    let values: Vec<ObjRef> = roots.iter().copied().collect();
    assert_eq!(values, vec![obj(0x20)]);
    drop(roots);

    registry.unregister_stable_ref(&mut thread, stable_ref);
}

/// 测试3: 规范场景 —— 注册 {10, 20, 30}，本地注销 h2，合并后根集为 (10, 30)
#[test]
fn test_register_three_unregister_middle() {
    let registry = StableRefRegistry::new();
    let mut thread = registry.attach_thread();

    let h1 = registry.register_stable_ref(&mut thread, obj(10));
    let h2 = registry.register_stable_ref(&mut thread, obj(20));
    let h3 = registry.register_stable_ref(&mut thread, obj(30));

    registry.unregister_stable_ref(&mut thread, h2);
    registry.process_thread(&mut thread);

    let roots = registry.iter();
    let values: Vec<ObjRef> = roots.iter().copied().collect();
    // h2 在合并前被本地移除，其余保持 FIFO 顺序
    assert_eq!(values, vec![obj(10), obj(30)]);
    drop(roots);

    registry.unregister_stable_ref(&mut thread, h1);
    registry.unregister_stable_ref(&mut thread, h3);
}

/// 测试4: 令牌地址在合并前后保持稳定
#[test]
fn test_token_address_stable_across_publish() {
    let registry = StableRefRegistry::new();
    let mut thread = registry.attach_thread();

    let stable_ref = registry.register_stable_ref(&mut thread, obj(0x30));
    let raw = stable_ref.into_raw();

    registry.process_thread(&mut thread);

    // 合并前拆解的地址在合并后仍指向同一条目
    // SAFETY: raw 来自本注册表中尚未注销的引用的 into_raw
    let rebuilt = unsafe { crate::StableRef::from_raw(raw) };
    assert_eq!(unsafe { rebuilt.external_ref() }, obj(0x30));
    assert_eq!(registry.iter().len(), 1);

    registry.unregister_stable_ref(&mut thread, rebuilt);
    assert_eq!(registry.iter().len(), 0);
}

/// 测试5: 合并后注销同样生效
#[test]
fn test_unregister_after_merge() {
    let registry = StableRefRegistry::new();
    let mut thread = registry.attach_thread();

    let stable_ref = registry.register_stable_ref(&mut thread, obj(0x40));
    registry.process_thread(&mut thread);
    assert_eq!(registry.iter().len(), 1);

    registry.unregister_stable_ref(&mut thread, stable_ref);
    assert_eq!(registry.iter().len(), 0);
}

/// 测试6: 线程脱离时待发布引用被自动发布
#[test]
fn test_thread_detach_publishes_pending() {
    let registry = StableRefRegistry::new();
    let mut thread = registry.attach_thread();

    let stable_ref = registry.register_stable_ref(&mut thread, obj(0x50));

    // 线程带着未合并的引用脱离
    drop(thread);

    // 引用仍是根，而不是悬空
    assert_eq!(registry.iter().len(), 1);

    // 任何线程都可以注销已发布的引用
    let mut other = registry.attach_thread();
    registry.unregister_stable_ref(&mut other, stable_ref);
    assert_eq!(registry.iter().len(), 0);
}

/// 测试7: 往返性质 —— 任意顺序注销后根集回到原状
#[test]
fn test_round_trip_any_unregister_order() {
    let registry = StableRefRegistry::new();
    let mut thread = registry.attach_thread();

    let mut refs = Vec::new();
    for i in 0..16 {
        refs.push(registry.register_stable_ref(&mut thread, obj(0x1000 + i)));
    }

    // 一半在合并前注销，一半在合并后注销
    for stable_ref in refs.drain(8..) {
        registry.unregister_stable_ref(&mut thread, stable_ref);
    }
    registry.process_thread(&mut thread);
    assert_eq!(registry.iter().len(), 8);

    // 余下的乱序注销
    while let Some(stable_ref) = refs.pop() {
        registry.unregister_stable_ref(&mut thread, stable_ref);
    }

    registry.process_thread(&mut thread);
    assert_eq!(thread.pending(), 0);
    assert_eq!(registry.iter().len(), 0);
}

/// 测试8: 多次收集周期之间根集保持一致
#[test]
fn test_multiple_collection_cycles() {
    let registry = StableRefRegistry::new();
    let mut thread = registry.attach_thread();

    let h1 = registry.register_stable_ref(&mut thread, obj(1));
    registry.process_thread(&mut thread);
    assert_eq!(registry.iter().len(), 1);

    // 第二个周期：新增一个引用
    let h2 = registry.register_stable_ref(&mut thread, obj(2));
    registry.process_thread(&mut thread);
    let roots = registry.iter();
    let values: Vec<ObjRef> = roots.iter().copied().collect();
    assert_eq!(values, vec![obj(1), obj(2)]);
    drop(roots);

    // 第三个周期：移除最早的引用
    registry.unregister_stable_ref(&mut thread, h1);
    registry.process_thread(&mut thread);
    let roots = registry.iter();
    let values: Vec<ObjRef> = roots.iter().copied().collect();
    assert_eq!(values, vec![obj(2)]);
    drop(roots);

    registry.unregister_stable_ref(&mut thread, h2);
}
